//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Bundle lifecycle
    pub bundles_built_total: IntCounter,
    pub bundles_submitted_total: IntCounter,
    pub bundles_landed_total: IntCounter,
    pub bundles_rejected_total: IntCounter,
    pub bundles_timed_out_total: IntCounter,

    // Errors, labelled by `BundleError::category`
    pub build_errors_total: IntCounterVec,
    pub rpc_errors_total: IntCounter,

    // Gauges
    pub bundles_in_flight: IntGauge,

    // Histograms
    pub build_latency: Histogram,
    pub relay_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let bundles_built_total = IntCounter::with_opts(Opts::new(
            "bundles_built_total",
            "Bundles that reached the ready stage",
        ))?;

        let bundles_submitted_total = IntCounter::with_opts(Opts::new(
            "bundles_submitted_total",
            "Bundles accepted by the relay",
        ))?;

        let bundles_landed_total = IntCounter::with_opts(Opts::new(
            "bundles_landed_total",
            "Bundles confirmed on-chain",
        ))?;

        let bundles_rejected_total = IntCounter::with_opts(Opts::new(
            "bundles_rejected_total",
            "Bundles rejected by the relay at submit or during polling",
        ))?;

        let bundles_timed_out_total = IntCounter::with_opts(Opts::new(
            "bundles_timed_out_total",
            "Bundles with no terminal status after polling",
        ))?;

        let build_errors_total = IntCounterVec::new(
            Opts::new("build_errors_total", "Failed bundle builds by error category"),
            &["category"],
        )?;

        let rpc_errors_total = IntCounter::with_opts(Opts::new(
            "rpc_errors_total",
            "Chain RPC calls that failed after retries",
        ))?;

        let bundles_in_flight = IntGauge::with_opts(Opts::new(
            "bundles_in_flight",
            "Bundles currently being built, submitted or polled",
        ))?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Bundle build latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.02, 0.05, 0.1, 0.5]),
        )?;

        let relay_latency = Histogram::with_opts(
            HistogramOpts::new("relay_latency_seconds", "Relay sendBundle latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(bundles_built_total.clone()))?;
        registry.register(Box::new(bundles_submitted_total.clone()))?;
        registry.register(Box::new(bundles_landed_total.clone()))?;
        registry.register(Box::new(bundles_rejected_total.clone()))?;
        registry.register(Box::new(bundles_timed_out_total.clone()))?;
        registry.register(Box::new(build_errors_total.clone()))?;
        registry.register(Box::new(rpc_errors_total.clone()))?;
        registry.register(Box::new(bundles_in_flight.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;
        registry.register(Box::new(relay_latency.clone()))?;

        Ok(Self {
            registry,
            bundles_built_total,
            bundles_submitted_total,
            bundles_landed_total,
            bundles_rejected_total,
            bundles_timed_out_total,
            build_errors_total,
            rpc_errors_total,
            bundles_in_flight,
            build_latency,
            relay_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a failed build under its error category
    pub fn record_build_error(&self, category: &str) {
        self.build_errors_total.with_label_values(&[category]).inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps `bundles_in_flight` accurate across early returns
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl InFlightGuard {
    pub fn new(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self {
            gauge: gauge.clone(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.bundles_built_total.inc();
        metrics.record_build_error("construction");
        assert_eq!(metrics.bundles_built_total.get(), 1);
        assert_eq!(
            metrics
                .build_errors_total
                .with_label_values(&["construction"])
                .get(),
            1
        );
    }

    #[test]
    fn test_encode_text_lists_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.bundles_landed_total.inc();
        metrics.build_latency.observe(0.002);
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("bundles_landed_total 1"));
        assert!(text.contains("build_latency_seconds_bucket"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_secs() >= 0.005);
    }

    #[test]
    fn test_in_flight_guard() {
        let metrics = Metrics::new().unwrap();
        {
            let _guard = InFlightGuard::new(&metrics.bundles_in_flight);
            assert_eq!(metrics.bundles_in_flight.get(), 1);
        }
        assert_eq!(metrics.bundles_in_flight.get(), 0);
    }
}
