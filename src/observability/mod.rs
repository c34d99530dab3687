//! 可观测性：日志初始化与追踪端口

pub mod trace;

pub use trace::{
    InMemoryTracer, TraceEvent, TraceLevel, TraceSpan, Tracer, DEFAULT_TRACE_CAPACITY,
};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 日志：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
