//! Correlation of one bundle's build, submit and poll phases
//!
//! A [`TraceContext`] is created per `build_and_submit` call. Each phase
//! runs inside a child span that shares the root's trace and correlation
//! ids, so a single `correlation_id` filter pulls out the whole lifecycle
//! of one bundle from the logs.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

/// Id shared by every log line about one bundle
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Trace ids for one bundle operation or one of its phases
#[derive(Debug, Clone)]
pub struct TraceContext {
    trace_id: Uuid,
    span_id: Uuid,
    parent_span_id: Option<Uuid>,
    correlation_id: CorrelationId,
    /// `sell`, `create_and_buy`, ... or a phase name such as `poll`
    operation: &'static str,
    started: Instant,
}

impl TraceContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            correlation_id: CorrelationId::new(),
            operation,
            started: Instant::now(),
        }
    }

    /// Child context for one phase of this operation
    pub fn phase(&self, phase: &'static str) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            correlation_id: self.correlation_id.clone(),
            operation: phase,
            started: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn parent_span_id(&self) -> Option<Uuid> {
        self.parent_span_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// `tracing` span carrying the ids as fields
    pub fn span(&self) -> tracing::Span {
        match self.parent_span_id {
            None => tracing::info_span!(
                "bundle",
                operation = self.operation,
                correlation_id = %self.correlation_id,
                trace_id = %self.trace_id,
            ),
            Some(parent) => tracing::info_span!(
                "phase",
                phase = self.operation,
                span_id = %self.span_id,
                parent_span_id = %parent,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_keeps_trace_and_correlation() {
        let root = TraceContext::new("sell");
        let poll = root.phase("poll");

        assert_eq!(poll.trace_id(), root.trace_id());
        assert_eq!(poll.correlation_id(), root.correlation_id());
        assert_eq!(poll.parent_span_id(), Some(root.span_id));
        assert_eq!(poll.operation(), "poll");
        assert!(root.parent_span_id().is_none());
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let id = CorrelationId::new();
        assert_ne!(id, CorrelationId::new());
        assert_eq!(id.as_str().len(), 32);
        assert_eq!(CorrelationId::from("abc").to_string(), "abc");
    }
}
