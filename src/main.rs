//! Taskhive 服务入口：初始化日志、加载配置、装配任务执行器并启动 HTTP 服务。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use taskhive::{agent::create_task_runner, api, config::load_config, observability};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    tracing::info!(tasks_dir = %cfg.app.tasks_dir.display(), "config loaded");

    let runner = Arc::new(create_task_runner(&cfg));
    api::serve(&cfg, runner).await.context("Server failed")?;

    Ok(())
}
