//! Broker event payloads
//!
//! Wire shape of the order-accepted event: `{order_id, symbol, side, price, qty, ts}`
//! with `ts` in Unix milliseconds. The broker message key is the order id.

use crate::ids::OrderId;
use crate::order::{PendingOrder, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAcceptedEvent {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "qty", with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Emission time, Unix millis
    pub ts: i64,
}

impl OrderAcceptedEvent {
    pub fn from_order(order: &PendingOrder, emitted_at: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            ts: emitted_at.timestamp_millis(),
        }
    }

    /// Routing key: every event for one order lands on the same partition
    pub fn partition_key(&self) -> String {
        self.order_id.to_string()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
