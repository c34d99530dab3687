//! 运行时装配
//!
//! create_llm_from_config 按 [llm].provider 选择 LLM 后端；
//! create_task_runner 构建工具注册表、分派器、认知步骤与任务执行器，供 HTTP 服务共享。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::observability::{InMemoryTracer, Tracer};
use crate::react::PlanningCognition;
use crate::tasks::{TaskCatalog, TaskRunner};
use crate::tools::{ApiTool, CentralReportTool, ToolExecutor, ToolRegistry};

/// 按配置创建 LLM 客户端：openai（默认）或 mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match cfg.llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        other => {
            if other != "openai" {
                tracing::warn!(provider = %other, "unknown llm provider, falling back to openai");
            }
            if std::env::var("OPENAI_API_KEY").is_err() {
                tracing::warn!("OPENAI_API_KEY is not set, completion calls will fail");
            }
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                None,
                cfg.llm.timeouts.request,
            ))
        }
    }
}

/// 启动时注册一次全部工具
pub fn create_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(ApiTool::new(cfg.tools.tool_timeout_secs));
    tools.register(CentralReportTool::new(
        cfg.tools.central.report_url.clone(),
        cfg.tools.central.api_key_env.clone(),
        cfg.tools.tool_timeout_secs,
    ));
    tools
}

/// 使用给定 LLM 构建任务执行器（测试可注入 MockLlmClient）
pub fn create_task_runner_with_llm(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> TaskRunner {
    let params = cfg.llm.generation_params();
    let executor = Arc::new(ToolExecutor::new(
        create_tool_registry(cfg),
        cfg.tools.tool_timeout_secs,
    ));
    tracing::info!(actions = ?executor.actions(), "tools registered");

    let cognition = PlanningCognition::new(
        Arc::clone(&llm),
        executor,
        params.clone(),
        cfg.agent.max_tool_steps,
    );
    let tracer: Arc<dyn Tracer> =
        Arc::new(InMemoryTracer::with_capacity(cfg.observability.trace_capacity));

    TaskRunner::new(
        TaskCatalog::new(&cfg.app.tasks_dir, cfg.app.description_file.clone()),
        Arc::new(cognition),
        llm,
        tracer,
        params,
    )
}

pub fn create_task_runner(cfg: &AppConfig) -> TaskRunner {
    create_task_runner_with_llm(cfg, create_llm_from_config(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_both_actions() {
        let registry = create_tool_registry(&AppConfig::default());
        assert_eq!(registry.actions(), vec!["request", "send_report"]);
    }

    #[tokio::test]
    async fn test_mock_provider_runner_lists_configured_root() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.app.tasks_dir = dir.path().to_path_buf();

        let runner = create_task_runner(&cfg);
        let tasks = runner.catalog().list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "a");
    }
}
