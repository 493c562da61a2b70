//! Process-local idempotency response cache

use std::time::{Duration, Instant};

use dashmap::DashMap;
use intake_types::ids::IdempotencyKey;

use crate::models::OrderResponse;

#[derive(Clone)]
struct Entry {
    response: OrderResponse,
    stored_at: Instant,
}

/// Process-local cache of responses keyed by idempotency key
///
/// Avoids a ledger round trip for keys already seen by this process. The
/// ledger's key uniqueness is what actually bounds duplicate orders; two
/// concurrent misses on the same key both reach the ledger and one of them
/// comes back as a duplicate.
pub struct IdempotencyStore {
    entries: DashMap<IdempotencyKey, Entry>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Exact-match lookup. Expired entries are treated as absent.
    pub fn lookup(&self, key: &IdempotencyKey) -> Option<OrderResponse> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    /// Record the response for a key. Last writer wins.
    pub fn store(&self, key: IdempotencyKey, response: OrderResponse) {
        let previous = self.entries.insert(
            key,
            Entry {
                response,
                stored_at: Instant::now(),
            },
        );
        if let Some(previous) = previous {
            tracing::warn!(
                previous_order_id = %previous.response.order_id,
                "Idempotency entry overwritten"
            );
        }
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
