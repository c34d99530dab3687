//! 认知层：Planner 解析、Prompt 模板、think 步骤（Cognition）

pub mod cognition;
pub mod planner;
pub mod prompt;

pub use cognition::{Cognition, PlanningCognition};
pub use planner::{parse_llm_output, PlannedCall, PlannerOutput};
pub use prompt::{answer_prompt, planner_prompt};
