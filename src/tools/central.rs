//! 中心上报工具：将答案以固定格式 POST 到中心 API
//!
//! 仅支持 action "send_report"。上报体为 {task: "JSON", apikey, answer}；
//! apikey 每次调用时从环境变量读取（不缓存），缺失时生成失败文档而不是报错。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::memory::DocumentSource;
use crate::tools::schema::{ToolRequest, SEND_REPORT_ACTION};
use crate::tools::{ToolContext, ToolProvider, ToolSuccess};

const REPORT_TASK: &str = "JSON";

/// 上报请求体
#[derive(Debug, Serialize)]
struct ReportBody<'a> {
    task: &'a str,
    apikey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<Value>,
}

pub struct CentralReportTool {
    client: Client,
    report_url: String,
    api_key_env: String,
}

impl CentralReportTool {
    pub fn new(report_url: impl Into<String>, api_key_env: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            report_url: report_url.into(),
            api_key_env: api_key_env.into(),
        }
    }

    fn api_key(&self) -> Result<String, ToolError> {
        std::env::var(&self.api_key_env).map_err(|e| {
            ToolError::Configuration(format!("{} is not available: {}", self.api_key_env, e))
        })
    }

    async fn send_report(&self, answer: Option<Value>) -> Result<Value, ToolError> {
        let body = ReportBody {
            task: REPORT_TASK,
            apikey: self.api_key()?,
            answer,
        };
        let resp = self
            .client
            .post(&self.report_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Upstream(format!("Request failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Upstream(format!("HTTP {}", status)));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ToolError::Upstream(format!("Invalid JSON response: {}", e)))
    }
}

#[async_trait]
impl ToolProvider for CentralReportTool {
    fn name(&self) -> &str {
        "central"
    }

    fn description(&self) -> &str {
        "Submit the final answer to the central reporting API. Payload: {\"data\": <answer json>}."
    }

    fn actions(&self) -> &[&'static str] {
        &[SEND_REPORT_ACTION]
    }

    fn source(&self) -> DocumentSource {
        DocumentSource::Central
    }

    fn trace_op(&self) -> &str {
        "central_report"
    }

    fn failure_prefix(&self) -> &str {
        "Failed to send report"
    }

    async fn handle(&self, request: ToolRequest, _ctx: &ToolContext) -> Result<ToolSuccess, ToolError> {
        let report = match request {
            ToolRequest::SendReport(report) => report,
            other => return Err(ToolError::UnknownAction(other.action().to_string())),
        };
        let data = self.send_report(report.data).await?;
        Ok(ToolSuccess {
            text: format!("Successfully sent report to central API. Response: {}", data),
            description: Some("Central API report submission".to_string()),
            response: data,
        })
    }
}
