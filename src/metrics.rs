//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub confirmed_total: IntCounter,
    pub expired_total: IntCounter,
    pub rejected_total: IntCounter,
    pub network_failures_total: IntCounter,
    pub transport_retries_total: IntCounter,
    pub rebroadcasts_total: IntCounter,

    // Histograms
    pub confirm_latency: Histogram,
    pub rpc_latency: Histogram,
    pub build_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "issuance_submissions_total",
            "Number of signed envelopes handed to the ledger",
        ))?;

        let confirmed_total = IntCounter::with_opts(Opts::new(
            "issuance_confirmed_total",
            "Number of submissions that reached the requested commitment",
        ))?;

        let expired_total = IntCounter::with_opts(Opts::new(
            "issuance_expired_total",
            "Number of submissions whose blockhash window elapsed",
        ))?;

        let rejected_total = IntCounter::with_opts(Opts::new(
            "issuance_rejected_total",
            "Number of submissions definitively refused by the ledger",
        ))?;

        let network_failures_total = IntCounter::with_opts(Opts::new(
            "issuance_network_failures_total",
            "Number of pipeline runs aborted by an unreachable RPC endpoint",
        ))?;

        let transport_retries_total = IntCounter::with_opts(Opts::new(
            "rpc_transport_retries_total",
            "Number of RPC requests retried after a transient failure",
        ))?;

        let rebroadcasts_total = IntCounter::with_opts(Opts::new(
            "issuance_rebroadcasts_total",
            "Number of times a pending signed envelope was resent",
        ))?;

        let confirm_latency = Histogram::with_opts(
            HistogramOpts::new(
                "issuance_confirm_latency_seconds",
                "Time from first send to reaching the requested commitment",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 80.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("build_latency_seconds", "Envelope build latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.02, 0.05, 0.1, 0.5]),
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(confirmed_total.clone()))?;
        registry.register(Box::new(expired_total.clone()))?;
        registry.register(Box::new(rejected_total.clone()))?;
        registry.register(Box::new(network_failures_total.clone()))?;
        registry.register(Box::new(transport_retries_total.clone()))?;
        registry.register(Box::new(rebroadcasts_total.clone()))?;
        registry.register(Box::new(confirm_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            confirmed_total,
            expired_total,
            rejected_total,
            network_failures_total,
            transport_retries_total,
            rebroadcasts_total,
            confirm_latency,
            rpc_latency,
            build_latency,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
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
        histogram.observe(self.elapsed_secs());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render_contains_counters() {
        let m = Metrics::new().unwrap();
        m.submissions_total.inc();
        m.confirm_latency.observe(1.5);

        let text = m.render().unwrap();
        assert!(text.contains("issuance_submissions_total 1"));
        assert!(text.contains("issuance_confirm_latency_seconds_count 1"));
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let before = metrics().rebroadcasts_total.get();
        metrics().rebroadcasts_total.inc();
        assert!(metrics().rebroadcasts_total.get() > before);
    }
}
