//! # Prometheus Metrics
//!
//! Operational metrics for the transaction API, scraped at `/metrics` on the
//! metrics address. Everything lives in a dedicated `sable` registry.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Metric handles shared by the RPC handlers and the block producer loop.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Transactions admitted to the pool through any RPC route.
    pub transactions_submitted_total: IntCounter,
    /// Submissions refused, labelled by error kind.
    pub transactions_rejected_total: IntCounterVec,
    pub calls_total: IntCounter,
    pub estimates_total: IntCounter,
    /// Simulator probes per completed estimate.
    pub estimate_probes: Histogram,
    /// RPC handling latency, labelled by method.
    pub rpc_latency_seconds: HistogramVec,
    pub block_height: IntGauge,
    pub pool_size: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("sable".into()), None)?;

        let transactions_submitted_total = IntCounter::new(
            "transactions_submitted_total",
            "Transactions admitted to the pending pool",
        )?;
        registry.register(Box::new(transactions_submitted_total.clone()))?;

        let transactions_rejected_total = IntCounterVec::new(
            Opts::new(
                "transactions_rejected_total",
                "Transaction submissions refused, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(transactions_rejected_total.clone()))?;

        let calls_total = IntCounter::new("calls_total", "Simulated calls served")?;
        registry.register(Box::new(calls_total.clone()))?;

        let estimates_total = IntCounter::new("estimates_total", "Gas estimates served")?;
        registry.register(Box::new(estimates_total.clone()))?;

        // Bisection over an 8M gas window needs at most ~24 probes.
        let estimate_probes = Histogram::with_opts(
            HistogramOpts::new("estimate_probes", "Simulator probes per gas estimate")
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 32.0]),
        )?;
        registry.register(Box::new(estimate_probes.clone()))?;

        let rpc_latency_seconds = HistogramVec::new(
            HistogramOpts::new("rpc_latency_seconds", "JSON-RPC handling latency in seconds")
                .buckets(vec![
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
                ]),
            &["method"],
        )?;
        registry.register(Box::new(rpc_latency_seconds.clone()))?;

        let block_height = IntGauge::new("block_height", "Height of the latest sealed block")?;
        registry.register(Box::new(block_height.clone()))?;

        let pool_size = IntGauge::new("pool_size", "Transactions waiting in the pending pool")?;
        registry.register(Box::new(pool_size.clone()))?;

        Ok(Self {
            registry,
            transactions_submitted_total,
            transactions_rejected_total,
            calls_total,
            estimates_total,
            estimate_probes,
            rpc_latency_seconds,
            block_height,
            pool_size,
        })
    }

    /// Renders every registered metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics`.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_prefix() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.transactions_submitted_total.inc();
        metrics
            .transactions_rejected_total
            .with_label_values(&["pool"])
            .inc();
        metrics.estimate_probes.observe(17.0);

        let text = metrics.encode().unwrap();
        assert!(text.contains("sable_transactions_submitted_total 1"));
        assert!(text.contains("sable_transactions_rejected_total{kind=\"pool\"} 1"));
        assert!(text.contains("sable_estimate_probes_count 1"));
    }
}
