//! 单任务执行状态机
//!
//! Initialized -> StateBound -> Thinking -> Answering -> Finalizing -> Completed，任一阶段失败进入 Failed。
//! 每次执行拥有独立的 StateStore：租约在 StateBound 获得，随返回（含错误路径）drop 释放，
//! 一个执行中的慢调用不会阻塞其它并发执行。

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::{ConversationState, StateError, StateLease, StateStore, TaskError, TaskStatus};
use crate::llm::{CompletionRequest, GenerationParams, LlmClient};
use crate::memory::Message;
use crate::observability::{TraceLevel, TraceSpan, Tracer};
use crate::react::{answer_prompt, Cognition};
use crate::tasks::TaskCatalog;

/// 回答为空时的占位文本
pub const NO_RESPONSE: &str = "No response received";
/// Finalizing 阶段追加到当前动作结果的说明
pub const TURN_COMPLETED_NOTE: &str = "This turn was completed. ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Initialized,
    StateBound,
    Thinking,
    Answering,
    Finalizing,
    Completed,
    Failed,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Initialized => "initialized",
            TaskPhase::StateBound => "state_bound",
            TaskPhase::Thinking => "thinking",
            TaskPhase::Answering => "answering",
            TaskPhase::Finalizing => "finalizing",
            TaskPhase::Completed => "completed",
            TaskPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次任务执行的结果（POST /tasks/{name} 的响应体）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    pub task: String,
    pub response: String,
    pub conversation_id: String,
}

/// 一次执行消耗的 token（并发执行共享同一客户端时为近似值）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenDelta {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// 执行结果及结束时的会话状态
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub outcome: TaskOutcome,
    pub state: ConversationState,
}

pub struct TaskRunner {
    catalog: TaskCatalog,
    cognition: Arc<dyn Cognition>,
    llm: Arc<dyn LlmClient>,
    tracer: Arc<dyn Tracer>,
    params: GenerationParams,
}

impl TaskRunner {
    pub fn new(
        catalog: TaskCatalog,
        cognition: Arc<dyn Cognition>,
        llm: Arc<dyn LlmClient>,
        tracer: Arc<dyn Tracer>,
        params: GenerationParams,
    ) -> Self {
        Self {
            catalog,
            cognition,
            llm,
            tracer,
            params,
        }
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// 执行指定任务
    pub async fn run(&self, name: &str) -> Result<TaskOutcome, TaskError> {
        self.execute(name).await.map(|execution| execution.outcome)
    }

    /// 执行指定任务，并返回结束时的会话状态
    pub async fn execute(&self, name: &str) -> Result<TaskExecution, TaskError> {
        let mut phase = TaskPhase::Initialized;
        let result = self.run_phases(name, &mut phase).await;
        if let Err(e) = &result {
            tracing::debug!(task = %name, from = %phase, to = %TaskPhase::Failed, error = %e, "task phase");
        }
        result
    }

    async fn run_phases(&self, name: &str, phase: &mut TaskPhase) -> Result<TaskExecution, TaskError> {
        let description = self.catalog.load_task_description(name).await?;
        // 记录初始 token 数，用于计算本次增量
        let (init_prompt, init_completion, _) = self.llm.token_usage();
        let request = CompletionRequest::one_shot(description, self.params.clone());
        let conversation_id = request.conversation_id.clone();

        let store = StateStore::new();
        let lease = store.bind(&request).await;
        let span = self.tracer.start_trace(lease.conversation_uuid());
        transition(phase, TaskPhase::StateBound, name, &conversation_id);

        transition(phase, TaskPhase::Thinking, name, &conversation_id);
        self.cognition.think(&lease, &span).await?;

        transition(phase, TaskPhase::Answering, name, &conversation_id);
        let response = self.answer(&lease, &request, &span).await?;
        let (cur_prompt, cur_completion, _) = self.llm.token_usage();
        let usage = TokenDelta {
            prompt_tokens: cur_prompt.saturating_sub(init_prompt),
            completion_tokens: cur_completion.saturating_sub(init_completion),
        };
        tracing::info!(
            task = %name,
            conversation_id = %conversation_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "token usage"
        );
        span.event(
            "token_usage",
            json!({ "task": name }),
            json!(usage),
            TraceLevel::Debug,
        );

        transition(phase, TaskPhase::Finalizing, name, &conversation_id);
        finalize(&lease, &span).await;

        let state = lease.snapshot().await;
        lease.release();
        transition(phase, TaskPhase::Completed, name, &conversation_id);
        Ok(TaskExecution {
            outcome: TaskOutcome {
                task: name.to_string(),
                response,
                conversation_id,
            },
            state,
        })
    }

    async fn answer(
        &self,
        lease: &StateLease,
        request: &CompletionRequest,
        span: &TraceSpan,
    ) -> Result<String, TaskError> {
        let system = answer_prompt(&*lease.read().await);
        let mut messages = vec![Message::system(system)];
        messages.extend(request.messages.iter().cloned());

        let response = self
            .llm
            .complete(&messages, &request.params)
            .await?
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());

        span.event(
            "final_answer",
            json!({ "messages": messages }),
            json!({ "response": response }),
            TraceLevel::Default,
        );
        Ok(response)
    }
}

fn transition(phase: &mut TaskPhase, next: TaskPhase, task: &str, conversation_id: &str) {
    tracing::debug!(task = %task, conversation_id = %conversation_id, from = %phase, to = %next, "task phase");
    *phase = next;
}

/// 标记 final 任务完成并给当前动作追加说明；两者并发、互不回滚，失败只记录
async fn finalize(lease: &StateLease, span: &TraceSpan) {
    let (final_task, current_action) = {
        let state = lease.read().await;
        (
            state.final_task().map(|t| t.uuid),
            state.config.current_action,
        )
    };
    let Some(final_task) = final_task else {
        tracing::debug!("no final task registered, skipping finalize");
        return;
    };

    let (status, note) = tokio::join!(
        lease.update_task_status(final_task, TaskStatus::Completed),
        append_note(lease, current_action),
    );

    for (name, result) in [("finalize_task_status", status), ("finalize_action_note", note)] {
        if let Err(e) = result {
            tracing::warn!(step = name, error = %e, "finalize step failed");
            span.event(
                name,
                json!({ "task": final_task.to_string() }),
                json!({ "error": e.to_string() }),
                TraceLevel::Warning,
            );
        }
    }
}

async fn append_note(lease: &StateLease, action: Option<Uuid>) -> Result<(), StateError> {
    match action {
        Some(uuid) => lease.append_action_result(uuid, TURN_COMPLETED_NOTE).await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Task, FINAL_TASK_TYPE};
    use crate::llm::MockLlmClient;
    use crate::observability::InMemoryTracer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// 登记 final 任务与一个已有结果的当前动作
    struct FinalOnly;

    #[async_trait]
    impl Cognition for FinalOnly {
        async fn think(&self, lease: &StateLease, _span: &TraceSpan) -> Result<(), TaskError> {
            let mut state = lease.write().await;
            let task = state.add_task(Task::new(FINAL_TASK_TYPE, "answer"));
            let mut action = Action::new(task, None);
            action.set_result("draft. ");
            state.bind_action(action);
            Ok(())
        }
    }

    /// 登记 final 任务，但当前动作指向不存在的动作
    struct DanglingAction;

    #[async_trait]
    impl Cognition for DanglingAction {
        async fn think(&self, lease: &StateLease, _span: &TraceSpan) -> Result<(), TaskError> {
            let mut state = lease.write().await;
            state.add_task(Task::new(FINAL_TASK_TYPE, "answer"));
            state.config.current_action = Some(Uuid::new_v4());
            Ok(())
        }
    }

    /// 每次调用计 10 个 prompt token、2 个 completion token
    #[derive(Default)]
    struct MeteredLlm {
        prompt: AtomicU64,
        completion: AtomicU64,
    }

    #[async_trait]
    impl LlmClient for MeteredLlm {
        async fn complete(
            &self,
            _messages: &[Message],
            _params: &GenerationParams,
        ) -> Result<Option<String>, crate::llm::LlmError> {
            self.prompt.fetch_add(10, Ordering::SeqCst);
            self.completion.fetch_add(2, Ordering::SeqCst);
            Ok(Some("metered".to_string()))
        }

        fn token_usage(&self) -> (u64, u64, u64) {
            let prompt = self.prompt.load(Ordering::SeqCst);
            let completion = self.completion.load(Ordering::SeqCst);
            (prompt, completion, prompt + completion)
        }
    }

    const STALL_MARKER: &str = "Wait for an upstream that never answers.";

    /// 描述为 STALL_MARKER 时永远挂起，模拟卡住的外部调用
    struct StallOnMarker;

    #[async_trait]
    impl Cognition for StallOnMarker {
        async fn think(&self, lease: &StateLease, span: &TraceSpan) -> Result<(), TaskError> {
            let stalled = lease
                .read()
                .await
                .messages
                .first()
                .is_some_and(|m| m.content == STALL_MARKER);
            if stalled {
                std::future::pending::<()>().await;
            }
            FinalOnly.think(lease, span).await
        }
    }

    struct Fails;

    #[async_trait]
    impl Cognition for Fails {
        async fn think(&self, _lease: &StateLease, _span: &TraceSpan) -> Result<(), TaskError> {
            Err(TaskError::Internal("think failed".to_string()))
        }
    }

    fn tasks_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("summarize")).unwrap();
        std::fs::write(
            dir.path().join("summarize").join("taskDescription.md"),
            "Summarize the text.",
        )
        .unwrap();
        dir
    }

    fn runner(
        dir: &TempDir,
        cognition: Arc<dyn Cognition>,
        llm: Arc<MockLlmClient>,
        tracer: Arc<InMemoryTracer>,
    ) -> TaskRunner {
        TaskRunner::new(
            TaskCatalog::new(dir.path(), "taskDescription.md"),
            cognition,
            llm,
            tracer,
            GenerationParams::default(),
        )
    }

    #[tokio::test]
    async fn test_run_completes_and_finalizes() {
        let dir = tasks_dir();
        let llm = Arc::new(MockLlmClient::with_replies(["OK"]));
        let tracer = Arc::new(InMemoryTracer::new());
        let runner = runner(&dir, Arc::new(FinalOnly), Arc::clone(&llm), Arc::clone(&tracer));

        let TaskExecution { outcome, state } = runner.execute("summarize").await.unwrap();
        assert_eq!(outcome.task, "summarize");
        assert_eq!(outcome.response, "OK");
        assert!(!outcome.conversation_id.is_empty());

        assert_eq!(state.final_task().unwrap().status, TaskStatus::Completed);
        assert_eq!(
            state.current_action().unwrap().result.as_deref(),
            Some("draft. This turn was completed. ")
        );

        let calls = llm.calls();
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][1].content, "Summarize the text.");

        let span = tracer.get(&outcome.conversation_id).unwrap();
        assert!(span.events().iter().any(|e| e.name == "final_answer"));
    }

    #[tokio::test]
    async fn test_failing_finalize_half_keeps_response() {
        let dir = tasks_dir();
        let llm = Arc::new(MockLlmClient::with_replies(["OK"]));
        let tracer = Arc::new(InMemoryTracer::new());
        let runner = runner(&dir, Arc::new(DanglingAction), llm, Arc::clone(&tracer));

        let TaskExecution { outcome, state } = runner.execute("summarize").await.unwrap();
        assert_eq!(outcome.response, "OK");

        assert_eq!(state.final_task().unwrap().status, TaskStatus::Completed);
        let span = tracer.get(&outcome.conversation_id).unwrap();
        let failed = span
            .events()
            .into_iter()
            .find(|e| e.name == "finalize_action_note")
            .unwrap();
        assert_eq!(failed.level, TraceLevel::Warning);
    }

    #[tokio::test]
    async fn test_empty_completion_uses_placeholder() {
        let dir = tasks_dir();
        let llm = Arc::new(MockLlmClient::new());
        llm.push_empty();
        let runner = runner(&dir, Arc::new(FinalOnly), llm, Arc::new(InMemoryTracer::new()));
        assert_eq!(runner.run("summarize").await.unwrap().response, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let dir = tasks_dir();
        let runner = runner(
            &dir,
            Arc::new(FinalOnly),
            Arc::new(MockLlmClient::new()),
            Arc::new(InMemoryTracer::new()),
        );
        let err = runner.run("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_token_usage_is_per_run() {
        let dir = tasks_dir();
        let llm = Arc::new(MeteredLlm::default());
        let tracer = Arc::new(InMemoryTracer::new());
        let runner = TaskRunner::new(
            TaskCatalog::new(dir.path(), "taskDescription.md"),
            Arc::new(FinalOnly),
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            Arc::clone(&tracer) as Arc<dyn Tracer>,
            GenerationParams::default(),
        );

        runner.run("summarize").await.unwrap();
        let second = runner.run("summarize").await.unwrap();
        assert_eq!(llm.token_usage(), (20, 4, 24));

        let span = tracer.get(&second.conversation_id).unwrap();
        let usage = span
            .events()
            .into_iter()
            .find(|e| e.name == "token_usage")
            .unwrap();
        assert_eq!(usage.output, json!({"prompt_tokens": 10, "completion_tokens": 2}));
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let dir = tasks_dir();
        let runner = runner(
            &dir,
            Arc::new(Fails),
            Arc::new(MockLlmClient::new()),
            Arc::new(InMemoryTracer::new()),
        );
        assert!(matches!(runner.run("summarize").await, Err(TaskError::Internal(_))));
        // 失败后再次执行不会被遗留的租约卡住
        assert!(matches!(runner.run("summarize").await, Err(TaskError::Internal(_))));
    }

    #[tokio::test]
    async fn test_stalled_run_does_not_block_other_runs() {
        let dir = tasks_dir();
        std::fs::create_dir_all(dir.path().join("stall")).unwrap();
        std::fs::write(dir.path().join("stall").join("taskDescription.md"), STALL_MARKER).unwrap();

        let llm = Arc::new(MockLlmClient::new());
        let runner = Arc::new(runner(
            &dir,
            Arc::new(StallOnMarker),
            llm,
            Arc::new(InMemoryTracer::new()),
        ));

        let stalled = {
            let runner = Arc::clone(&runner);
            tokio::spawn(async move { runner.run("stall").await })
        };
        tokio::task::yield_now().await;

        let outcome = tokio::time::timeout(Duration::from_secs(2), runner.run("summarize"))
            .await
            .expect("second run finished while the first is stalled")
            .unwrap();
        assert_eq!(outcome.task, "summarize");
        assert!(!stalled.is_finished());
        stalled.abort();
    }
}
