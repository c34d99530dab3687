//! 工具请求校验与 JSON Schema 生成
//!
//! (action, payload) 在分派边界被解析为封闭的 ToolRequest 变体，每个变体有自己的严格 schema；
//! 校验失败返回 ToolError::Validation，未注册的 action 返回 ToolError::UnknownAction。
//! 工具调用格式的 JSON Schema 由 schemars 生成，拼入 planner 的 system prompt。

use std::collections::HashMap;

use reqwest::Url;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ToolError;

pub const API_REQUEST_ACTION: &str = "request";
pub const SEND_REPORT_ACTION: &str = "send_report";

/// 允许的 HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_method(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// `request` 动作的原始 payload
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ApiRequestPayload {
    /// 绝对 URL，如 https://example.com/api
    pub endpoint: String,
    pub method: HttpMethod,
    /// 任意 JSON，存在时序列化为请求体
    #[serde(default)]
    pub body: Option<Value>,
    /// 额外请求头，可覆盖默认的 Content-Type
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

/// 校验后的 API 请求
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: Url,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

/// `send_report` 动作的 payload：data 原样作为 answer 上报
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ReportPayload {
    #[serde(default)]
    pub data: Option<Value>,
}

/// 已校验的工具请求（封闭集合）
#[derive(Debug, Clone)]
pub enum ToolRequest {
    ApiRequest(ApiRequest),
    SendReport(ReportPayload),
}

impl ToolRequest {
    /// 解析并校验 (action, payload)
    pub fn parse(action: &str, payload: &Value) -> Result<Self, ToolError> {
        match action {
            API_REQUEST_ACTION => validate_api_request(payload).map(ToolRequest::ApiRequest),
            SEND_REPORT_ACTION => validate_report(payload).map(ToolRequest::SendReport),
            other => Err(ToolError::UnknownAction(other.to_string())),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ToolRequest::ApiRequest(_) => API_REQUEST_ACTION,
            ToolRequest::SendReport(_) => SEND_REPORT_ACTION,
        }
    }
}

pub fn validate_api_request(payload: &Value) -> Result<ApiRequest, ToolError> {
    let raw: ApiRequestPayload = serde_json::from_value(payload.clone())
        .map_err(|e| ToolError::Validation(format!("invalid request payload: {}", e)))?;
    let endpoint = Url::parse(&raw.endpoint)
        .map_err(|e| ToolError::Validation(format!("invalid endpoint url '{}': {}", raw.endpoint, e)))?;
    Ok(ApiRequest {
        endpoint,
        method: raw.method,
        body: raw.body.filter(|b| !b.is_null()),
        headers: raw.headers.unwrap_or_default(),
    })
}

pub fn validate_report(payload: &Value) -> Result<ReportPayload, ToolError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ToolError::Validation(format!("invalid report payload: {}", e)))
}

/// 工具调用格式：{"tool": "<action>", "payload": {...}}（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(Deserialize, JsonSchema)]
#[serde(tag = "tool", content = "payload")]
enum ToolCallFormat {
    /// 发起任意 HTTP 请求
    #[serde(rename = "request")]
    Request(ApiRequestPayload),
    /// 向中心 API 提交答案
    #[serde(rename = "send_report")]
    SendReport(ReportPayload),
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_api_request() {
        let req = validate_api_request(&json!({
            "endpoint": "https://x.test/y",
            "method": "POST",
            "body": {"a": 1},
            "headers": {"X-Token": "t"}
        }))
        .unwrap();
        assert_eq!(req.endpoint.as_str(), "https://x.test/y");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.body, Some(json!({"a": 1})));
        assert_eq!(req.headers.get("X-Token").map(String::as_str), Some("t"));
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        let err = validate_api_request(&json!({"endpoint": "/y", "method": "GET"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err =
            validate_api_request(&json!({"endpoint": "https://x.test", "method": "HEAD"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[test]
    fn test_non_string_header_rejected() {
        let err = validate_api_request(&json!({
            "endpoint": "https://x.test",
            "method": "GET",
            "headers": {"X-Count": 3}
        }))
        .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[test]
    fn test_null_body_is_absent() {
        let req = validate_api_request(&json!({
            "endpoint": "https://x.test",
            "method": "GET",
            "body": null
        }))
        .unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn test_parse_routes_actions() {
        let req = ToolRequest::parse("send_report", &json!({"data": [1, 2]})).unwrap();
        assert_eq!(req.action(), SEND_REPORT_ACTION);
        let err = ToolRequest::parse("delete_everything", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::UnknownAction("delete_everything".to_string()));
    }

    #[test]
    fn test_schema_mentions_actions() {
        let schema = tool_call_schema_json();
        assert!(schema.contains("request"));
        assert!(schema.contains("send_report"));
        assert!(schema.contains("endpoint"));
    }
}
