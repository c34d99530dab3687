//! 追踪端口（Trace / Span）
//!
//! TraceSpan 是按 trace_id 组织的只追加事件序列（name / input / output / level），
//! 每条事件同时镜像到 tracing 日志。Tracer 是追踪后端的抽象，InMemoryTracer 为进程内实现（容量有限，淘汰最旧的 trace）。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

/// 事件级别（与常见 LLM 追踪后端的级别一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    Debug,
    Default,
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct TraceEvent {
    pub name: String,
    pub input: Value,
    pub output: Value,
    pub level: TraceLevel,
}

/// 只追加的 span；clone 后共享同一事件序列
#[derive(Clone, Debug)]
pub struct TraceSpan {
    trace_id: String,
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceSpan {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// 追加一条事件并写入日志
    pub fn event(&self, name: &str, input: Value, output: Value, level: TraceLevel) {
        match level {
            TraceLevel::Debug => {
                tracing::debug!(trace_id = %self.trace_id, event = name, output = %output, "trace")
            }
            TraceLevel::Default => {
                tracing::info!(trace_id = %self.trace_id, event = name, output = %output, "trace")
            }
            TraceLevel::Warning => {
                tracing::warn!(trace_id = %self.trace_id, event = name, output = %output, "trace")
            }
            TraceLevel::Error => {
                tracing::error!(trace_id = %self.trace_id, event = name, output = %output, "trace")
            }
        }
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(TraceEvent {
            name: name.to_string(),
            input,
            output,
            level,
        });
    }

    /// 当前事件快照（按追加顺序）
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 追踪后端：按 trace_id 打开（或复用）一个 span
pub trait Tracer: Send + Sync {
    fn start_trace(&self, trace_id: &str) -> TraceSpan;
}

/// 默认保留的 trace 数量
pub const DEFAULT_TRACE_CAPACITY: usize = 100;

#[derive(Debug, Default)]
struct TraceBuffer {
    spans: HashMap<String, TraceSpan>,
    /// 按创建顺序排列的 trace_id，超出容量时从队首淘汰
    order: VecDeque<String>,
}

/// 进程内追踪后端：只保留最近 capacity 个 trace，供测试与调试查询
#[derive(Debug)]
pub struct InMemoryTracer {
    capacity: usize,
    traces: Mutex<TraceBuffer>,
}

impl Default for InMemoryTracer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            traces: Mutex::new(TraceBuffer::default()),
        }
    }

    pub fn get(&self, trace_id: &str) -> Option<TraceSpan> {
        self.traces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .spans
            .get(trace_id)
            .cloned()
    }

    /// 当前保留的 trace_id（由旧到新）
    pub fn trace_ids(&self) -> Vec<String> {
        self.traces
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .order
            .iter()
            .cloned()
            .collect()
    }
}

impl Tracer for InMemoryTracer {
    fn start_trace(&self, trace_id: &str) -> TraceSpan {
        let mut traces = self.traces.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(span) = traces.spans.get(trace_id) {
            return span.clone();
        }

        while traces.order.len() >= self.capacity {
            if let Some(evicted) = traces.order.pop_front() {
                traces.spans.remove(&evicted);
                tracing::debug!(trace_id = %evicted, "trace evicted");
            }
        }
        let span = TraceSpan::new(trace_id);
        traces.order.push_back(trace_id.to_string());
        traces.spans.insert(trace_id.to_string(), span.clone());
        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_span_is_append_only_and_ordered() {
        let span = TraceSpan::new("t-1");
        span.event("a_attempt", json!({}), json!({}), TraceLevel::Default);
        span.event("a_outcome", json!({}), json!({"success": false}), TraceLevel::Error);
        let events = span.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "a_attempt");
        assert_eq!(events[1].level, TraceLevel::Error);
    }

    #[test]
    fn test_tracer_reuses_span_for_same_id() {
        let tracer = InMemoryTracer::new();
        let span = tracer.start_trace("conv");
        span.event("x", json!(null), json!(null), TraceLevel::Debug);
        let again = tracer.start_trace("conv");
        assert_eq!(again.len(), 1);
        assert_eq!(tracer.trace_ids(), vec!["conv".to_string()]);
    }

    #[test]
    fn test_tracer_keeps_only_recent_traces() {
        let tracer = InMemoryTracer::with_capacity(2);
        for id in ["c-1", "c-2", "c-3"] {
            tracer
                .start_trace(id)
                .event("final_answer", json!({}), json!({}), TraceLevel::Default);
        }
        assert_eq!(tracer.trace_ids(), vec!["c-2".to_string(), "c-3".to_string()]);
        assert!(tracer.get("c-1").is_none());

        // 复用已有 trace 不触发淘汰
        tracer.start_trace("c-2");
        assert_eq!(tracer.trace_ids().len(), 2);
        assert_eq!(tracer.get("c-2").unwrap().len(), 1);
    }

    #[test]
    fn test_level_serializes_uppercase() {
        assert_eq!(serde_json::to_value(TraceLevel::Error).unwrap(), json!("ERROR"));
    }
}
