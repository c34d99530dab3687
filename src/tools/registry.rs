//! 工具注册表
//!
//! 工具提供者实现 ToolProvider（元信息 + 强类型 handle），启动时由 ToolRegistry 按 action 名注册一次；
//! 未注册的 action 统一落入「未知动作」失败文档。execute 是全函数：任何输入都返回 Document。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::memory::{Document, DocumentFactory, DocumentMetadata, DocumentSource};
use crate::observability::{TraceLevel, TraceSpan};
use crate::tools::ToolRequest;

/// 工具执行上下文：执行时从会话状态读取的会话 id，以及可选的追踪 span
#[derive(Clone, Debug, Default)]
pub struct ToolContext {
    pub conversation_uuid: Option<String>,
    pub span: Option<TraceSpan>,
}

impl ToolContext {
    pub fn new(conversation_uuid: Option<String>, span: Option<TraceSpan>) -> Self {
        Self {
            conversation_uuid,
            span,
        }
    }

    pub fn conversation(&self) -> Option<&str> {
        self.conversation_uuid.as_deref()
    }

    /// 调用前：记录 attempt 事件
    pub fn trace_attempt(&self, op: &str, action: &str, payload: &Value) {
        if let Some(span) = &self.span {
            span.event(
                &format!("{}_attempt", op),
                json!({ "action": action, "payload": payload }),
                json!({ "action": action }),
                TraceLevel::Default,
            );
        }
    }

    /// 调用后：记录 outcome 事件（每次调用恰好一次，携带真实结果）
    pub fn trace_outcome(&self, op: &str, action: &str, result: &Result<Value, ToolError>) {
        let Some(span) = &self.span else {
            return;
        };
        let input = json!({ "action": action });
        match result {
            Ok(output) => span.event(
                &format!("{}_outcome", op),
                input,
                json!({ "success": true, "response": output }),
                TraceLevel::Default,
            ),
            Err(e) => span.event(
                &format!("{}_outcome", op),
                input,
                json!({ "success": false, "error": e.to_string() }),
                TraceLevel::Error,
            ),
        }
    }
}

/// 工具成功结果：文档文本与可选描述
#[derive(Clone, Debug)]
pub struct ToolSuccess {
    pub text: String,
    pub description: Option<String>,
    /// 写入 outcome 事件的原始响应
    pub response: Value,
}

/// 工具提供者 trait
///
/// 提供者只实现强类型的 handle；统一的 execute 负责 action 检查、payload 校验、
/// attempt / outcome 追踪以及 Document 构建。
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// 提供者名称
    fn name(&self) -> &str;

    /// 描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 支持的 action 集合
    fn actions(&self) -> &[&'static str];

    /// 生成 Document 时使用的来源
    fn source(&self) -> DocumentSource;

    /// 追踪事件名前缀（<op>_attempt / <op>_outcome）
    fn trace_op(&self) -> &str;

    /// 失败文档文本前缀，如 "API request failed"
    fn failure_prefix(&self) -> &str;

    /// 处理已校验的请求
    async fn handle(&self, request: ToolRequest, ctx: &ToolContext) -> Result<ToolSuccess, ToolError>;

    /// 执行；永不返回错误，失败也生成 Document
    async fn execute(&self, action: &str, payload: Value, ctx: &ToolContext) -> Document {
        ctx.trace_attempt(self.trace_op(), action, &payload);

        if !self.actions().iter().any(|a| *a == action) {
            let err = ToolError::UnknownAction(action.to_string());
            ctx.trace_outcome(self.trace_op(), action, &Err(err));
            return unknown_action_document(action, ctx, self.source());
        }

        let result = match ToolRequest::parse(action, &payload) {
            Ok(request) => self.handle(request, ctx).await,
            Err(e) => Err(e),
        };
        let traced = result
            .as_ref()
            .map(|ok| ok.response.clone())
            .map_err(Clone::clone);
        ctx.trace_outcome(self.trace_op(), action, &traced);

        match result {
            Ok(success) => {
                let mut metadata = DocumentMetadata::text(self.source());
                metadata.description = success.description;
                DocumentFactory::success(ctx.conversation(), success.text, metadata)
            }
            Err(e) => {
                tracing::warn!(tool = self.name(), action, error = %e, "tool call failed");
                DocumentFactory::failure(
                    ctx.conversation(),
                    format!("{}: {}", self.failure_prefix(), e),
                    self.source(),
                )
            }
        }
    }
}

/// 未知动作的失败文档，文本固定为 "Unknown action: <action>"
pub fn unknown_action_document(action: &str, ctx: &ToolContext, source: DocumentSource) -> Document {
    DocumentFactory::failure(
        ctx.conversation(),
        ToolError::UnknownAction(action.to_string()).to_string(),
        source,
    )
}

/// 工具注册表：action 名 -> 提供者
#[derive(Default)]
pub struct ToolRegistry {
    providers: HashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册提供者的全部 action；同名 action 后注册者覆盖先注册者
    pub fn register(&mut self, provider: impl ToolProvider + 'static) {
        let provider: Arc<dyn ToolProvider> = Arc::new(provider);
        for action in provider.actions() {
            if let Some(previous) = self
                .providers
                .insert(action.to_string(), Arc::clone(&provider))
            {
                tracing::warn!(
                    action = %action,
                    previous = previous.name(),
                    "tool action registered twice, replacing"
                );
            }
        }
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn ToolProvider>> {
        self.providers.get(action).cloned()
    }

    /// 已注册的 action 名（排序）
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self.providers.keys().cloned().collect();
        actions.sort();
        actions
    }

    /// 返回 (action, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.actions()
            .into_iter()
            .filter_map(|action| {
                let provider = self.providers.get(&action)?;
                Some((action, provider.description().to_string()))
            })
            .collect()
    }

    /// 按 action 分派；未注册时返回来源为 dispatcher 的未知动作文档
    pub async fn dispatch(&self, action: &str, payload: Value, ctx: &ToolContext) -> Document {
        match self.providers.get(action) {
            Some(provider) => provider.execute(action, payload, ctx).await,
            None => unknown_action_document(action, ctx, DocumentSource::Dispatcher),
        }
    }
}
