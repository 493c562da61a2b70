//! Request and response bodies of the HTTP API

use intake_types::ids::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller input for `POST /api/v1/trade/orders`
///
/// Missing fields take their zero value and are reported by the validator,
/// so `{}` yields `EmptySymbol` rather than a decode error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, rename = "qty", alias = "quantity")]
    pub quantity: Decimal,
}

/// Intake result status; only acceptance is ever reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
}

/// Successful intake response, also the value cached per idempotency key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub status: AckStatus,
}

impl OrderResponse {
    pub fn accepted(order_id: OrderId) -> Self {
        Self {
            order_id,
            status: AckStatus::Accepted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub ledger: bool,
    pub publisher: bool,
    pub env: String,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_sha: String,
    pub build_ts: String,
}
