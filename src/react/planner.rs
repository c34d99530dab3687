//! Planner 输出解析
//!
//! 从 LLM 文本中提取 JSON（```json ... ``` 或裸 JSON），解析为工具调用或最终决定。
//! 看起来像工具调用但 JSON 无效时按最终决定处理，并记录 warn。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// LLM 返回的工具调用：{"tool": "<action>", "payload": {...}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub tool: String,
    #[serde(default)]
    pub payload: Value,
}

/// Planner 输出
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerOutput {
    /// 不再调用工具
    Final(String),
    /// 需要执行工具
    ToolCall(PlannedCall),
}

fn extract_json(trimmed: &str) -> Option<&str> {
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 解析 LLM 输出：含有效 JSON 且 tool 非空则为 ToolCall，否则为 Final
pub fn parse_llm_output(output: &str) -> PlannerOutput {
    let trimmed = output.trim();
    let Some(json_str) = extract_json(trimmed) else {
        return PlannerOutput::Final(trimmed.to_string());
    };

    match serde_json::from_str::<PlannedCall>(json_str) {
        Ok(call) if !call.tool.trim().is_empty() => PlannerOutput::ToolCall(call),
        Ok(_) => PlannerOutput::Final(trimmed.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "planner output is not a valid tool call, treating as final");
            PlannerOutput::Final(trimmed.to_string())
        }
    }
}
