//! Prompt 模板
//!
//! answer_prompt：回答阶段的 system prompt，汇总本轮已执行的工具结果；
//! planner_prompt：规划阶段的 system prompt，列出可用工具与调用格式。

use crate::core::ConversationState;

/// 单条文档文本写入 prompt 时的最大字符数
const DOCUMENT_PREVIEW_CHARS: usize = 1000;

fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        format!("{}...", text.chars().take(limit).collect::<String>())
    } else {
        text.to_string()
    }
}

/// 已执行动作与其结果的文本块；无动作时返回 None
fn actions_section(state: &ConversationState) -> Option<String> {
    let lines: Vec<String> = state
        .actions
        .iter()
        .filter_map(|action| {
            let tool = action.tool.as_deref()?;
            let result = action.result.as_deref().unwrap_or("(no result)");
            Some(format!("- {}: {}", tool, preview(result, DOCUMENT_PREVIEW_CHARS)))
        })
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// 回答阶段 system prompt
pub fn answer_prompt(state: &ConversationState) -> String {
    let mut prompt = String::from(
        "You are a precise task-solving assistant. Answer the user's task directly and concisely.\n",
    );
    if let Some(actions) = actions_section(state) {
        prompt.push_str("\n<performed_actions>\n");
        prompt.push_str(&actions);
        prompt.push_str("\n</performed_actions>\n");
    }
    if !state.documents.is_empty() {
        prompt.push_str("\n<documents>\n");
        for doc in &state.documents {
            prompt.push_str(&format!(
                "[{}:{:?}] {}\n",
                doc.metadata().source.as_str(),
                doc.outcome(),
                preview(doc.text(), DOCUMENT_PREVIEW_CHARS)
            ));
        }
        prompt.push_str("</documents>\n");
    }
    prompt.push_str("\nBase your answer only on the task and the information above.");
    prompt
}

/// 规划阶段 system prompt
pub fn planner_prompt(
    state: &ConversationState,
    tools: &[(String, String)],
    schema_json: &str,
) -> String {
    let tool_lines: Vec<String> = tools
        .iter()
        .map(|(action, desc)| format!("- {}: {}", action, desc))
        .collect();

    let mut prompt = format!(
        "You decide the next step for the user's task.\n\
         Available tools:\n{}\n\n\
         To call a tool, reply with ONLY a JSON object of the form \
         {{\"tool\": \"<action>\", \"payload\": {{...}}}}.\n\
         Tool call JSON schema:\n{}\n\n\
         When no further tool is needed, reply with a short plain-text summary of what to answer.\n",
        tool_lines.join("\n"),
        schema_json
    );
    if let Some(actions) = actions_section(state) {
        prompt.push_str("\nAlready performed:\n");
        prompt.push_str(&actions);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Task, TOOL_TASK_TYPE};

    #[test]
    fn test_answer_prompt_without_actions() {
        let prompt = answer_prompt(&ConversationState::default());
        assert!(!prompt.contains("<performed_actions>"));
        assert!(!prompt.contains("<documents>"));
    }

    #[test]
    fn test_prompts_list_performed_actions() {
        let mut state = ConversationState::default();
        let task = state.add_task(Task::new(TOOL_TASK_TYPE, "request"));
        let action = state.bind_action(Action::new(task, Some("request".to_string())));
        if let Some(a) = state.action_mut(action) {
            a.set_result("API Response: {\"ok\":true}");
        }

        let answer = answer_prompt(&state);
        assert!(answer.contains("- request: API Response"));

        let tools = vec![("request".to_string(), "HTTP".to_string())];
        let planner = planner_prompt(&state, &tools, "{}");
        assert!(planner.contains("- request: HTTP"));
        assert!(planner.contains("Already performed"));
    }
}
