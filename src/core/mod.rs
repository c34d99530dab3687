//! 核心层：错误类型与会话状态存储

pub mod error;
pub mod state;

pub use error::{StateError, TaskError, ToolError};
pub use state::{
    Action, ConversationState, InteractionConfig, StateLease, StateStore, Task, TaskStatus,
    FINAL_TASK_TYPE, TOOL_TASK_TYPE,
};
