//! HTTP 接口：任务列表、任务执行与健康检查

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, serve};
