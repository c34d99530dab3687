pub mod api;
pub mod central;
pub mod executor;
pub mod registry;
pub mod schema;

pub use api::ApiTool;
pub use central::CentralReportTool;
pub use executor::ToolExecutor;
pub use registry::{unknown_action_document, ToolContext, ToolProvider, ToolRegistry, ToolSuccess};
pub use schema::{
    tool_call_schema_json, ApiRequest, ApiRequestPayload, HttpMethod, ReportPayload, ToolRequest,
    API_REQUEST_ACTION, SEND_REPORT_ACTION,
};
