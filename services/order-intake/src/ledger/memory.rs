use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use intake_types::errors::LedgerError;
use intake_types::ids::{IdempotencyKey, OrderId};
use intake_types::order::{OrderRecord, OrderStatus, PendingOrder};

use super::OrderLedger;

/// Process-local ledger with the same key-uniqueness contract as Postgres.
///
/// Used by the `memory` backend and by tests, which drive its fault switches
/// and read its call counters.
pub struct InMemoryLedger {
    records: DashMap<OrderId, OrderRecord>,
    keys: DashMap<IdempotencyKey, OrderId>,
    fail_inserts: AtomicBool,
    fail_mark_failed: AtomicBool,
    reachable: AtomicBool,
    insert_delay_ms: AtomicU64,
    insert_calls: AtomicUsize,
    mark_failed_calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            keys: DashMap::new(),
            fail_inserts: AtomicBool::new(false),
            fail_mark_failed: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            insert_delay_ms: AtomicU64::new(0),
            insert_calls: AtomicUsize::new(0),
            mark_failed_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_mark_failed(&self, fail: bool) {
        self.fail_mark_failed.store(fail, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay applied before every insert completes
    pub fn set_insert_delay(&self, delay: Duration) {
        self.insert_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Insert attempts, including failed and duplicate ones
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn mark_failed_calls(&self) -> usize {
        self.mark_failed_calls.load(Ordering::SeqCst)
    }

    /// Advance a record to `accepted`, as a downstream consumer does once it
    /// has taken the order from the broker
    pub fn mark_accepted(&self, order_id: OrderId) -> Result<(), LedgerError> {
        let mut record = self
            .records
            .get_mut(&order_id)
            .ok_or(LedgerError::NotFound { order_id })?;
        record.status = OrderStatus::Accepted;
        record.updated_at = Utc::now();
        Ok(())
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderRecord> {
        self.records.get(order_id).map(|r| r.clone())
    }

    pub fn records(&self) -> Vec<OrderRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderLedger for InMemoryLedger {
    async fn insert_pending(&self, order: &PendingOrder) -> Result<(), LedgerError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.insert_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable {
                reason: "injected insert failure".to_string(),
            });
        }

        let record = OrderRecord::pending(order, Utc::now());
        match &order.idempotency_key {
            Some(key) => match self.keys.entry(key.clone()) {
                Entry::Occupied(existing) => {
                    let existing = *existing.get();
                    let status = self
                        .records
                        .get(&existing)
                        .map(|r| r.status)
                        .ok_or(LedgerError::NotFound { order_id: existing })?;
                    return Err(LedgerError::DuplicateIdempotencyKey { existing, status });
                }
                Entry::Vacant(slot) => {
                    // Record goes in while the key slot is still locked
                    self.records.insert(order.order_id, record);
                    slot.insert(order.order_id);
                }
            },
            None => {
                self.records.insert(order.order_id, record);
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<(), LedgerError> {
        self.mark_failed_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_mark_failed.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable {
                reason: "injected mark_failed failure".to_string(),
            });
        }

        let released_key = {
            let mut record = self
                .records
                .get_mut(&order_id)
                .ok_or(LedgerError::NotFound { order_id })?;
            let key = record.idempotency_key.clone();
            record.mark_failed(reason, Utc::now());
            key
        };

        if let Some(key) = released_key {
            self.keys.remove_if(&key, |_, bound| *bound == order_id);
        }
        Ok(())
    }

    async fn ping(&self, _timeout: Duration) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_types::order::Side;
    use rust_decimal::Decimal;

    fn order(key: Option<&str>) -> PendingOrder {
        PendingOrder::new(
            "BTCUSDT",
            Side::Buy,
            Decimal::new(50000, 0),
            Decimal::new(1, 1),
            key.and_then(|k| IdempotencyKey::parse(k).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_insert_then_mark_failed() {
        let ledger = InMemoryLedger::new();
        let order = order(None);
        ledger.insert_pending(&order).await.unwrap();
        assert_eq!(ledger.get(&order.order_id).unwrap().status, OrderStatus::Pending);

        ledger.mark_failed(order.order_id, "kafka_publish_failed").await.unwrap();
        let record = ledger.get(&order.order_id).unwrap();
        assert_eq!(record.status, OrderStatus::Failed);
        assert_eq!(record.failure_reason.as_deref(), Some("kafka_publish_failed"));
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_without_write() {
        let ledger = InMemoryLedger::new();
        let first = order(Some("abc"));
        ledger.insert_pending(&first).await.unwrap();

        let second = order(Some("abc"));
        let err = ledger.insert_pending(&second).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateIdempotencyKey {
                existing: first.order_id,
                status: OrderStatus::Pending,
            }
        );
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get(&second.order_id).is_none());

        ledger.mark_accepted(first.order_id).unwrap();
        let err = ledger.insert_pending(&order(Some("abc"))).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateIdempotencyKey {
                existing: first.order_id,
                status: OrderStatus::Accepted,
            }
        );
    }

    #[tokio::test]
    async fn test_mark_failed_releases_key() {
        let ledger = InMemoryLedger::new();
        let first = order(Some("abc"));
        ledger.insert_pending(&first).await.unwrap();
        ledger.mark_failed(first.order_id, "boom").await.unwrap();

        let retry = order(Some("abc"));
        ledger.insert_pending(&retry).await.unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_failed_unknown_order() {
        let ledger = InMemoryLedger::new();
        let id = OrderId::new();
        assert_eq!(
            ledger.mark_failed(id, "boom").await,
            Err(LedgerError::NotFound { order_id: id })
        );
    }

    #[tokio::test]
    async fn test_fault_switches() {
        let ledger = InMemoryLedger::new();
        ledger.set_fail_inserts(true);
        assert!(matches!(
            ledger.insert_pending(&order(None)).await,
            Err(LedgerError::Unavailable { .. })
        ));
        assert!(ledger.is_empty());
        assert_eq!(ledger.insert_calls(), 1);

        assert!(ledger.ping(Duration::from_millis(10)).await);
        ledger.set_reachable(false);
        assert!(!ledger.ping(Duration::from_millis(10)).await);
    }
}
