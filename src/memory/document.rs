//! Document 工厂
//!
//! 工具调用结果的唯一表示：成功与失败都会生成一条 Document。
//! 字段私有、只读，创建后不可修改；之后归文档存储所有。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 未绑定会话时 conversation_uuid / source_uuid 的占位值
pub const UNKNOWN_CONVERSATION: &str = "unknown";

/// 结果是否成功（Document 之外的调用方据此更新任务状态）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// 内容类型；目前工具只产出文本
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Text,
}

/// 来源：哪个工具（或分派器本身）生成了该 Document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    Api,
    Central,
    Dispatcher,
}

impl DocumentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSource::Api => "api",
            DocumentSource::Central => "central",
            DocumentSource::Dispatcher => "dispatcher",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub source: DocumentSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocumentMetadata {
    pub fn text(source: DocumentSource) -> Self {
        Self {
            doc_type: DocumentType::Text,
            source,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// 不可变的工具结果记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    uuid: Uuid,
    conversation_uuid: String,
    source_uuid: String,
    text: String,
    outcome: Outcome,
    created_at: DateTime<Utc>,
    metadata: DocumentMetadata,
}

impl Document {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn conversation_uuid(&self) -> &str {
        &self.conversation_uuid
    }

    pub fn source_uuid(&self) -> &str {
        &self.source_uuid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }
}

/// 构建 Document：会话 id 缺省时退化为 "unknown"，source_uuid 与会话 id 相同
pub struct DocumentFactory;

impl DocumentFactory {
    pub fn create(
        conversation_uuid: Option<&str>,
        outcome: Outcome,
        text: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Document {
        let conversation = conversation_uuid
            .filter(|id| !id.is_empty())
            .unwrap_or(UNKNOWN_CONVERSATION)
            .to_string();
        Document {
            uuid: Uuid::new_v4(),
            source_uuid: conversation.clone(),
            conversation_uuid: conversation,
            text: text.into(),
            outcome,
            created_at: Utc::now(),
            metadata,
        }
    }

    pub fn success(
        conversation_uuid: Option<&str>,
        text: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> Document {
        Self::create(conversation_uuid, Outcome::Success, text, metadata)
    }

    pub fn failure(
        conversation_uuid: Option<&str>,
        text: impl Into<String>,
        source: DocumentSource,
    ) -> Document {
        Self::create(
            conversation_uuid,
            Outcome::Failure,
            text,
            DocumentMetadata::text(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_conversation_defaults_to_unknown() {
        let doc = DocumentFactory::failure(None, "boom", DocumentSource::Api);
        assert_eq!(doc.conversation_uuid(), "unknown");
        assert_eq!(doc.source_uuid(), "unknown");
        assert!(!doc.is_success());
    }

    #[test]
    fn test_failure_metadata_has_no_description() {
        let doc = DocumentFactory::failure(Some("c-1"), "boom", DocumentSource::Central);
        let json = serde_json::to_value(doc.metadata()).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["source"], "central");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_success_keeps_description_and_ids() {
        let meta = DocumentMetadata::text(DocumentSource::Api).with_description("API request to x");
        let doc = DocumentFactory::success(Some("c-1"), "ok", meta);
        assert_eq!(doc.conversation_uuid(), "c-1");
        assert_eq!(doc.source_uuid(), "c-1");
        assert_eq!(doc.metadata().description.as_deref(), Some("API request to x"));
        assert_eq!(doc.outcome(), Outcome::Success);
    }
}
