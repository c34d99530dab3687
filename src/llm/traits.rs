//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete 为非流式完成，
//! 返回首个 choice 的消息文本（可能为空）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::memory::Message;

/// LLM 调用错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("completion request failed: {0}")]
    Request(String),
}

/// 生成参数：模型、温度、token 预算
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// 请求发起者（任务执行时固定为 system）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestUser {
    pub uuid: String,
    pub name: String,
    pub context: String,
    pub environment: String,
}

impl RequestUser {
    pub fn system() -> Self {
        Self {
            uuid: "system".to_string(),
            name: "system".to_string(),
            context: "system".to_string(),
            environment: "{}".to_string(),
        }
    }
}

/// 一次完成请求：消息 + 会话 id + 生成参数
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub conversation_id: String,
    pub stream: bool,
    pub user: RequestUser,
    #[serde(flatten)]
    pub params: GenerationParams,
}

impl CompletionRequest {
    /// 单条 user 消息的一次性请求，会话 id 每次新生成
    pub fn one_shot(content: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            messages: vec![Message::user(content)],
            conversation_id: Uuid::new_v4().to_string(),
            stream: false,
            user: RequestUser::system(),
            params,
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；Ok(None) 表示响应中没有可用的消息文本
    async fn complete(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<Option<String>, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
