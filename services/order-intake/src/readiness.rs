//! Readiness aggregation
//!
//! Pings the ledger and the publisher concurrently, each bounded by the same
//! timeout. A check that times out counts as unreachable; nothing here
//! returns an error or blocks past the bound.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::ledger::OrderLedger;
use crate::publisher::OrderPublisher;

/// Derived on every check, never cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessVerdict {
    pub ledger_reachable: bool,
    pub publisher_reachable: bool,
    pub overall: bool,
}

impl ReadinessVerdict {
    pub fn new(ledger_reachable: bool, publisher_reachable: bool) -> Self {
        Self {
            ledger_reachable,
            publisher_reachable,
            overall: ledger_reachable && publisher_reachable,
        }
    }
}

#[derive(Clone)]
pub struct ReadinessAggregator {
    ledger: Arc<dyn OrderLedger>,
    publisher: Arc<dyn OrderPublisher>,
}

impl ReadinessAggregator {
    pub fn new(ledger: Arc<dyn OrderLedger>, publisher: Arc<dyn OrderPublisher>) -> Self {
        Self { ledger, publisher }
    }

    pub async fn check_ready(&self, timeout: Duration) -> ReadinessVerdict {
        let (ledger_reachable, publisher_reachable) = tokio::join!(
            bounded(timeout, self.ledger.ping(timeout)),
            bounded(timeout, self.publisher.ping(timeout)),
        );

        let verdict = ReadinessVerdict::new(ledger_reachable, publisher_reachable);
        if !verdict.overall {
            tracing::warn!(
                ledger = ledger_reachable,
                publisher = publisher_reachable,
                "Dependencies not ready"
            );
        }
        verdict
    }
}

// Adapters bound their own pings too; this is the outer guarantee.
async fn bounded<F>(timeout: Duration, check: F) -> bool
where
    F: std::future::Future<Output = bool>,
{
    tokio::time::timeout(timeout, check).await.unwrap_or(false)
}
