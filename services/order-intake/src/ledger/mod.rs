//! Durable order ledger
//!
//! The ledger is the source of truth for order state. The intake path writes
//! a `pending` record before anything is published and, when publishing
//! fails, marks it `failed`.

use std::time::Duration;

use async_trait::async_trait;
use intake_types::errors::LedgerError;
use intake_types::ids::OrderId;
use intake_types::order::PendingOrder;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryLedger;
#[cfg(feature = "postgres")]
pub use postgres::PgLedger;

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persist a new `pending` record.
    ///
    /// When the order carries an idempotency key already bound to another
    /// record, nothing is written and
    /// [`LedgerError::DuplicateIdempotencyKey`] names the existing order and
    /// its current status.
    async fn insert_pending(&self, order: &PendingOrder) -> Result<(), LedgerError>;

    /// Transition a record to `failed` and release its idempotency key.
    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<(), LedgerError>;

    /// Side-effect free reachability check, bounded by `timeout`.
    async fn ping(&self, timeout: Duration) -> bool;
}
