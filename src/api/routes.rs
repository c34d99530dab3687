//! 路由与服务启动
//!
//! GET /tasks、POST /tasks/:name、GET /health；请求日志由 TraceLayer 输出。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::api::ApiError;
use crate::config::AppConfig;
use crate::tasks::{TaskOutcome, TaskRunner, TaskSummary};

/// 监听端口的环境变量覆盖
pub const PORT_ENV: &str = "TASKHIVE_PORT";

#[derive(Debug, Serialize)]
struct TaskList {
    tasks: Vec<TaskSummary>,
}

pub fn router(runner: Arc<TaskRunner>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:name", post(run_task))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(runner)
}

async fn list_tasks(State(runner): State<Arc<TaskRunner>>) -> Result<Json<TaskList>, ApiError> {
    let tasks = runner.catalog().list_tasks().await?;
    Ok(Json(TaskList { tasks }))
}

async fn run_task(
    State(runner): State<Arc<TaskRunner>>,
    Path(name): Path<String>,
) -> Result<Json<TaskOutcome>, ApiError> {
    tracing::info!(task = %name, "running task");
    let outcome = runner.run(&name).await?;
    Ok(Json(outcome))
}

async fn health() -> &'static str {
    "OK"
}

/// 绑定 [web] 地址（端口可被 TASKHIVE_PORT 覆盖）并运行服务，直到收到 Ctrl-C
pub async fn serve(cfg: &AppConfig, runner: Arc<TaskRunner>) -> std::io::Result<()> {
    let port = std::env::var(PORT_ENV)
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(cfg.web.port);
    let addr = format!("{}:{}", cfg.web.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(runner))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await
}
