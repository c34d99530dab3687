//! 任务层：任务目录与单任务执行状态机

pub mod catalog;
pub mod runner;

pub use catalog::{summarize, TaskCatalog, TaskSummary, NO_DESCRIPTION};
pub use runner::{
    TaskExecution, TaskOutcome, TaskPhase, TaskRunner, TokenDelta, NO_RESPONSE,
    TURN_COMPLETED_NOTE,
};
