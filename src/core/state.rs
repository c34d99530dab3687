//! 会话状态与状态存储
//!
//! ConversationState 记录一次交互的消息、任务、动作与文档；由 StateStore 独占持有。
//! 任务执行在 StateBound 阶段通过 bind 获得 StateLease（单写者租约），整体替换状态，
//! 直到 Completed / Failed 时 drop 租约才释放。租约内部的读写使用短时 RwLock，
//! 因此 finalize 的两个更新可以并发进行。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::core::StateError;
use crate::llm::CompletionRequest;
use crate::memory::{Document, Message};

/// 终结任务的类型标记
pub const FINAL_TASK_TYPE: &str = "final";
/// 工具调用任务的类型标记
pub const TOOL_TASK_TYPE: &str = "tool";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub task_type: String,
    pub name: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(task_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            task_type: task_type.into(),
            name: name.into(),
            status: TaskStatus::Pending,
        }
    }

    pub fn is_final(&self) -> bool {
        self.task_type == FINAL_TASK_TYPE
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    pub uuid: Uuid,
    pub task_uuid: Uuid,
    pub tool: Option<String>,
    pub result: Option<String>,
}

impl Action {
    pub fn new(task_uuid: Uuid, tool: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            task_uuid,
            tool,
            result: None,
        }
    }

    /// 设置结果；已有结果时不覆盖，返回 false
    pub fn set_result(&mut self, text: impl Into<String>) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(text.into());
        true
    }

    /// 在已有结果后追加文本
    pub fn append_result(&mut self, note: &str) {
        match &mut self.result {
            Some(result) => result.push_str(note),
            None => self.result = Some(note.to_string()),
        }
    }
}

/// 交互级配置：当前动作与生成参数
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InteractionConfig {
    pub current_action: Option<Uuid>,
    pub user_uuid: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub conversation_uuid: Option<String>,
    pub messages: Vec<Message>,
    pub tasks: Vec<Task>,
    pub actions: Vec<Action>,
    pub documents: Vec<Document>,
    pub config: InteractionConfig,
}

impl ConversationState {
    /// 从请求构建全新状态（不与旧状态合并）
    pub fn from_request(request: &CompletionRequest) -> Self {
        Self {
            conversation_uuid: Some(request.conversation_id.clone()),
            messages: request.messages.clone(),
            tasks: Vec::new(),
            actions: Vec::new(),
            documents: Vec::new(),
            config: InteractionConfig {
                current_action: None,
                user_uuid: Some(request.user.uuid.clone()),
                model: Some(request.params.model.clone()),
                temperature: Some(request.params.temperature),
                max_tokens: Some(request.params.max_tokens),
            },
        }
    }

    /// 第一个 type == "final" 的任务
    pub fn final_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is_final())
    }

    pub fn current_action(&self) -> Option<&Action> {
        let uuid = self.config.current_action?;
        self.actions.iter().find(|a| a.uuid == uuid)
    }

    pub fn task_mut(&mut self, uuid: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.uuid == uuid)
    }

    pub fn action_mut(&mut self, uuid: Uuid) -> Option<&mut Action> {
        self.actions.iter_mut().find(|a| a.uuid == uuid)
    }

    pub fn add_task(&mut self, task: Task) -> Uuid {
        let uuid = task.uuid;
        self.tasks.push(task);
        uuid
    }

    /// 注册动作并绑定为 current_action
    pub fn bind_action(&mut self, action: Action) -> Uuid {
        let uuid = action.uuid;
        self.actions.push(action);
        self.config.current_action = Some(uuid);
        uuid
    }

    pub fn record_document(&mut self, document: Document) {
        self.documents.push(document);
    }
}

/// 状态存储：进程内唯一持有者，写入需先获得租约
#[derive(Clone, Default)]
pub struct StateStore {
    writer: Arc<Mutex<()>>,
    state: Arc<RwLock<ConversationState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取单写者租约并用请求整体替换状态；已有租约时等待其释放
    pub async fn bind(&self, request: &CompletionRequest) -> StateLease {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        {
            let mut state = self.state.write().await;
            *state = ConversationState::from_request(request);
        }
        tracing::debug!(conversation_id = %request.conversation_id, "state bound");
        StateLease {
            conversation_uuid: request.conversation_id.clone(),
            state: Arc::clone(&self.state),
            _guard: guard,
        }
    }

    /// 只读快照（不需要租约）
    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }
}

/// 单写者租约：持有期间其它执行无法 bind；drop 即释放
pub struct StateLease {
    conversation_uuid: String,
    state: Arc<RwLock<ConversationState>>,
    _guard: OwnedMutexGuard<()>,
}

impl StateLease {
    pub fn conversation_uuid(&self) -> &str {
        &self.conversation_uuid
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ConversationState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, ConversationState> {
        self.state.write().await
    }

    pub async fn snapshot(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    pub async fn update_task_status(&self, uuid: Uuid, status: TaskStatus) -> Result<(), StateError> {
        let mut state = self.state.write().await;
        let task = state.task_mut(uuid).ok_or(StateError::TaskNotFound(uuid))?;
        task.status = status;
        Ok(())
    }

    pub async fn append_action_result(&self, uuid: Uuid, note: &str) -> Result<(), StateError> {
        let mut state = self.state.write().await;
        let action = state.action_mut(uuid).ok_or(StateError::ActionNotFound(uuid))?;
        action.append_result(note);
        Ok(())
    }

    pub fn release(self) {
        tracing::debug!(conversation_id = %self.conversation_uuid, "state released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationParams;
    use std::time::Duration;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::one_shot(text, GenerationParams::default())
    }

    #[tokio::test]
    async fn test_bind_replaces_state_wholesale() {
        let store = StateStore::new();
        let first = request("first");
        let lease = store.bind(&first).await;
        lease.write().await.add_task(Task::new(FINAL_TASK_TYPE, "answer"));
        lease.release();

        let second = request("second");
        let lease = store.bind(&second).await;
        let state = lease.snapshot().await;
        assert!(state.tasks.is_empty());
        assert_eq!(state.messages, vec![Message::user("second")]);
        assert_eq!(state.conversation_uuid.as_deref(), Some(second.conversation_id.as_str()));
    }

    #[tokio::test]
    async fn test_second_bind_waits_for_release() {
        let store = StateStore::new();
        let lease = store.bind(&request("a")).await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), store.bind(&request("b"))).await;
        assert!(blocked.is_err());

        drop(lease);
        let lease = tokio::time::timeout(Duration::from_millis(500), store.bind(&request("c")))
            .await
            .expect("bind after release");
        assert_eq!(lease.snapshot().await.messages[0].content, "c");
    }

    #[tokio::test]
    async fn test_finalize_updates_are_independent() {
        let store = StateStore::new();
        let lease = store.bind(&request("x")).await;
        let task_uuid = lease.write().await.add_task(Task::new(FINAL_TASK_TYPE, "answer"));
        let missing_action = Uuid::new_v4();

        let (task_res, action_res) = tokio::join!(
            lease.update_task_status(task_uuid, TaskStatus::Completed),
            lease.append_action_result(missing_action, "note"),
        );
        assert!(task_res.is_ok());
        assert_eq!(action_res, Err(StateError::ActionNotFound(missing_action)));
        assert_eq!(lease.read().await.final_task().unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn test_action_result_set_once_then_appended() {
        let mut action = Action::new(Uuid::new_v4(), Some("request".to_string()));
        assert!(action.set_result("first"));
        assert!(!action.set_result("second"));
        action.append_result(" done");
        assert_eq!(action.result.as_deref(), Some("first done"));
    }
}
