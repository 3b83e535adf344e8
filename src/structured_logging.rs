//! Structured logging of bundle lifecycle events

use crate::observability::CorrelationId;

/// Structured logger for bundle events
///
/// Never handed secret material: only addresses, counts and ids.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(correlation_id: &CorrelationId) -> Self {
        Self {
            context_id: correlation_id.to_string(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_build_started(&self, kind: &str, wallets: usize) {
        tracing::info!(
            context_id = %self.context_id,
            kind = %kind,
            wallets = %wallets,
            "Building bundle"
        );
    }

    pub fn log_bundle_built(&self, kind: &str, tx_count: usize, tip_index: Option<usize>, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            kind = %kind,
            tx_count = %tx_count,
            tip_index = ?tip_index,
            latency_ms = %latency_ms,
            "Bundle built"
        );
    }

    pub fn log_build_failure(&self, kind: &str, category: &str, error: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            kind = %kind,
            category = %category,
            error = %error,
            "Bundle build failed"
        );
    }

    pub fn log_submitted(&self, bundle_id: &str, tx_count: usize) {
        tracing::info!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            tx_count = %tx_count,
            "Bundle submitted"
        );
    }

    pub fn log_settled(&self, bundle_id: &str, status: &str, latency_ms: u64) {
        tracing::info!(
            context_id = %self.context_id,
            bundle_id = %bundle_id,
            status = %status,
            latency_ms = %latency_ms,
            "Bundle settled"
        );
    }

    pub fn log_submit_failure(&self, error: &str) {
        tracing::error!(
            context_id = %self.context_id,
            error = %error,
            "Bundle submission failed"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.context_id,
            message = %message,
            "Warning"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_carries_correlation_id() {
        let id = CorrelationId::from("corr-1");
        let logger = StructuredLogger::new(&id);
        assert_eq!(logger.context_id(), "corr-1");
        // No subscriber installed; events are dropped
        logger.log_build_started("sell", 3);
        logger.warn("nothing to sell");
    }
}
