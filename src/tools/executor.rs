//! 工具分派器
//!
//! 持有 ToolRegistry 与全局超时，execute(action, payload) 在超时内调用 registry.dispatch；
//! 超时也转为失败 Document 并补发 outcome 追踪事件，保证分派永不抛错；
//! 每次调用输出结构化审计日志（JSON，outcome 为 ok / error / timeout）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::ToolError;
use crate::memory::{Document, DocumentFactory, DocumentSource};
use crate::tools::{tool_call_schema_json, ToolContext, ToolProvider, ToolRegistry};

/// 工具分派器：对每次调用施加超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定 action；总是返回 Document
    pub async fn execute(&self, action: &str, payload: Value, ctx: &ToolContext) -> Document {
        let start = Instant::now();
        let payload_preview = payload_preview(&payload);
        let (document, outcome) = self.dispatch_with_timeout(action, payload, ctx).await;

        let audit = serde_json::json!({
            "event": "tool_audit",
            "action": action,
            "ok": document.is_success(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "payload_preview": payload_preview,
            "document": document.uuid().to_string(),
        });
        tracing::info!(audit = %audit, "tool");

        document
    }

    /// 超时内分派；返回文档与审计 outcome（ok / error / timeout）
    async fn dispatch_with_timeout(
        &self,
        action: &str,
        payload: Value,
        ctx: &ToolContext,
    ) -> (Document, &'static str) {
        match timeout(self.timeout, self.registry.dispatch(action, payload, ctx)).await {
            Ok(doc) => {
                let outcome = if doc.is_success() { "ok" } else { "error" };
                (doc, outcome)
            }
            Err(_) => {
                let err = ToolError::Timeout(action.to_string());
                // provider 的 future 已被丢弃，由分派器补发 outcome 事件
                let source = match self.registry.get(action) {
                    Some(provider) => {
                        ctx.trace_outcome(provider.trace_op(), action, &Err(err.clone()));
                        provider.source()
                    }
                    None => DocumentSource::Dispatcher,
                };
                tracing::warn!(action, timeout_secs = self.timeout.as_secs(), "tool call timed out");
                (
                    DocumentFactory::failure(ctx.conversation(), err.to_string(), source),
                    "timeout",
                )
            }
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.registry.actions()
    }

    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.registry.tool_descriptions()
    }

    pub fn tool_schema_json(&self) -> String {
        tool_call_schema_json()
    }
}

fn payload_preview(payload: &Value) -> String {
    let s = payload.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
