//! think 步骤：由 LLM 规划工具调用
//!
//! 每轮把 planner_prompt + 当前消息发给 LLM；解析为工具调用则登记 tool 任务与动作、
//! 经 ToolExecutor 分派、写回结果与 Document，再进入下一轮；解析为最终决定（或达到步数上限）
//! 时登记 final 任务与一个未设结果的当前动作，供 Finalizing 阶段更新。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::{
    Action, StateLease, Task, TaskError, TaskStatus, FINAL_TASK_TYPE, TOOL_TASK_TYPE,
};
use crate::llm::{GenerationParams, LlmClient};
use crate::memory::Message;
use crate::observability::{TraceLevel, TraceSpan};
use crate::react::{parse_llm_output, planner_prompt, PlannedCall, PlannerOutput};
use crate::tools::{ToolContext, ToolExecutor};

/// 最终任务的名称
const FINAL_TASK_NAME: &str = "answer";

/// 可插拔的 think 步骤；通过租约修改会话状态
#[async_trait]
pub trait Cognition: Send + Sync {
    async fn think(&self, lease: &StateLease, span: &TraceSpan) -> Result<(), TaskError>;
}

pub struct PlanningCognition {
    llm: Arc<dyn LlmClient>,
    executor: Arc<ToolExecutor>,
    params: GenerationParams,
    max_steps: usize,
}

impl PlanningCognition {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<ToolExecutor>,
        params: GenerationParams,
        max_steps: usize,
    ) -> Self {
        Self {
            llm,
            executor,
            params,
            max_steps,
        }
    }

    async fn plan(&self, lease: &StateLease, span: &TraceSpan, step: usize) -> Result<PlannerOutput, TaskError> {
        let messages = {
            let state = lease.read().await;
            let system = planner_prompt(
                &state,
                &self.executor.tool_descriptions(),
                &self.executor.tool_schema_json(),
            );
            let mut messages = vec![Message::system(system)];
            messages.extend(state.messages.iter().cloned());
            messages
        };

        let reply = self
            .llm
            .complete(&messages, &self.params)
            .await?
            .unwrap_or_default();
        span.event(
            "plan",
            json!({ "step": step }),
            json!({ "output": reply }),
            TraceLevel::Debug,
        );
        Ok(parse_llm_output(&reply))
    }

    async fn run_tool(&self, lease: &StateLease, span: &TraceSpan, call: PlannedCall) {
        let (task_uuid, action_uuid, conversation_uuid) = {
            let mut state = lease.write().await;
            let mut task = Task::new(TOOL_TASK_TYPE, call.tool.clone());
            task.status = TaskStatus::Running;
            let task_uuid = state.add_task(task);
            let action_uuid = state.bind_action(Action::new(task_uuid, Some(call.tool.clone())));
            (task_uuid, action_uuid, state.conversation_uuid.clone())
        };

        let ctx = ToolContext::new(conversation_uuid, Some(span.clone()));
        let document = self.executor.execute(&call.tool, call.payload, &ctx).await;
        let status = if document.is_success() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        tracing::debug!(tool = %call.tool, ?status, "tool step finished");

        let mut state = lease.write().await;
        if let Some(action) = state.action_mut(action_uuid) {
            action.set_result(document.text());
        }
        if let Some(task) = state.task_mut(task_uuid) {
            task.status = status;
        }
        state.messages.push(Message::assistant(format!(
            "Observation from {}: {}",
            call.tool,
            document.text()
        )));
        state.record_document(document);
    }

    async fn register_final(&self, lease: &StateLease) {
        let mut state = lease.write().await;
        let task_uuid = state.add_task(Task::new(FINAL_TASK_TYPE, FINAL_TASK_NAME));
        state.bind_action(Action::new(task_uuid, None));
    }
}

#[async_trait]
impl Cognition for PlanningCognition {
    async fn think(&self, lease: &StateLease, span: &TraceSpan) -> Result<(), TaskError> {
        for step in 0..self.max_steps {
            match self.plan(lease, span, step).await? {
                PlannerOutput::ToolCall(call) => self.run_tool(lease, span, call).await,
                PlannerOutput::Final(_) => {
                    self.register_final(lease).await;
                    return Ok(());
                }
            }
        }
        tracing::info!(max_steps = self.max_steps, "tool step limit reached");
        self.register_final(lease).await;
        Ok(())
    }
}
