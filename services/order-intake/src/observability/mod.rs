//! Logging and metrics setup

mod logging;
mod metrics;

pub use self::logging::init_tracing;
pub use self::metrics::{
    MetricsError, detached_handle, init_metrics, record_compensation_failure, record_order_outcome,
};
