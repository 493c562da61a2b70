//! Prometheus metrics for the intake path.
//!
//! - `intake_orders_total{result}`: one increment per intake request, with
//!   `result` in `accepted`, `idempotent`, `invalid`, `bad_request`,
//!   `db_error`, `kafka_error`, `in_progress`, `timeout`
//! - `intake_order_latency_seconds`: latency of accepted orders
//! - `intake_compensation_failures_total`: pending records left without a
//!   failure marker; alert on any increase

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Install the global Prometheus recorder; the handle renders `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// A handle not attached to the global recorder, for tests and tools
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

pub fn record_order_outcome(result: &'static str, latency: Option<Duration>) {
    counter!("intake_orders_total", "result" => result).increment(1);
    if let Some(latency) = latency {
        histogram!("intake_order_latency_seconds").record(latency.as_secs_f64());
    }
}

pub fn record_compensation_failure() {
    counter!("intake_compensation_failures_total").increment(1);
}
