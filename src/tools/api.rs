//! 通用 API 工具：按调用方指定的 method / endpoint / headers / body 发起 HTTP 请求
//!
//! 仅支持 action "request"。默认 Content-Type: application/json，可被调用方请求头覆盖；
//! 非 2xx 视为失败；成功时将响应体解析为 JSON 并嵌入文档文本。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;

use crate::core::ToolError;
use crate::memory::DocumentSource;
use crate::tools::schema::{ApiRequest, ToolRequest, API_REQUEST_ACTION};
use crate::tools::{ToolContext, ToolProvider, ToolSuccess};

pub struct ApiTool {
    client: Client,
}

impl ApiTool {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn build_headers(extra: &HashMap<String, String>) -> Result<HeaderMap, ToolError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ToolError::Validation(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ToolError::Validation(format!("invalid header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn send(&self, request: &ApiRequest) -> Result<Value, ToolError> {
        let headers = Self::build_headers(&request.headers)?;
        let mut builder = self
            .client
            .request(request.method.as_method(), request.endpoint.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let resp = builder
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
impl ToolProvider for ApiTool {
    fn name(&self) -> &str {
        "api"
    }

    fn description(&self) -> &str {
        "Make an HTTP request. Payload: {\"endpoint\": \"https://...\", \"method\": \"GET|POST|PUT|PATCH|DELETE\", \"body\": <json>?, \"headers\": {..}?}."
    }

    fn actions(&self) -> &[&'static str] {
        &[API_REQUEST_ACTION]
    }

    fn source(&self) -> DocumentSource {
        DocumentSource::Api
    }

    fn trace_op(&self) -> &str {
        "api_request"
    }

    fn failure_prefix(&self) -> &str {
        "API request failed"
    }

    async fn handle(&self, request: ToolRequest, _ctx: &ToolContext) -> Result<ToolSuccess, ToolError> {
        let request = match request {
            ToolRequest::ApiRequest(request) => request,
            other => return Err(ToolError::UnknownAction(other.action().to_string())),
        };
        let data = self.send(&request).await?;
        Ok(ToolSuccess {
            text: format!("API Response: {}", data),
            description: Some(format!("API request to {}", request.endpoint)),
            response: data,
        })
    }
}
