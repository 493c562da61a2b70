//! Order types for the intake path
//!
//! An order enters as an untyped request, becomes a [`PendingOrder`] once
//! validated, and is persisted as an [`OrderRecord`].

use crate::ids::{IdempotencyKey, OrderId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a side, ignoring ASCII case. Anything other than buy/sell is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("buy") {
            Some(Side::Buy)
        } else if raw.eq_ignore_ascii_case("sell") {
            Some(Side::Sell)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable order status
///
/// The intake core writes `Pending` and, on compensation, `Failed`.
/// `Accepted` is set by downstream consumers and only ever read here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated order about to be written to the ledger
///
/// The order id is assigned here, after validation, and is the same id used
/// as the broker partition key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl PendingOrder {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            symbol: symbol.into(),
            side,
            price,
            quantity,
            idempotency_key,
        }
    }
}

/// Persisted order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: OrderStatus,
    /// Present only when `status` is `Failed`
    pub failure_reason: Option<String>,
    /// Released (set to `None`) when the order is marked failed
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Build the initial `pending` record for an order
    pub fn pending(order: &PendingOrder, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            status: OrderStatus::Pending,
            failure_reason: None,
            idempotency_key: order.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the pending -> failed compensation.
    ///
    /// Clears the idempotency key so a retry under the same key can create a
    /// fresh order.
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.idempotency_key = None;
        self.updated_at = now;
    }
}
