//! 错误类型
//!
//! 两层错误：TaskError 在任务层向上传播，由 HTTP 边界映射为状态码；
//! ToolError 只存在于工具边界之内，总是被转换为失败 Document，永不外泄。

use thiserror::Error;
use uuid::Uuid;

use crate::llm::LlmError;

/// 任务执行过程中可能出现的错误（描述缺失、状态、LLM、IO 等）
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task {0} not found")]
    NotFound(String),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }
}

/// 工具层错误：校验失败、上游失败、配置缺失、未知动作、超时
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),
}

/// 会话状态更新错误（finalize 阶段的两个子操作各自可能失败）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("task {0} not found in conversation state")]
    TaskNotFound(Uuid),

    #[error("action {0} not found in conversation state")]
    ActionNotFound(Uuid),
}
