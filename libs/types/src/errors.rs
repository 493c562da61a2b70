//! Error taxonomy for the intake path
//!
//! - [`ValidationError`]: caller fault, never retried server-side
//! - [`LedgerError`]: store fault at the pending write (nothing published yet)
//! - [`PublishError`]: broker fault after a durable pending write exists

use crate::ids::OrderId;
use crate::order::OrderStatus;
use thiserror::Error;

/// Structural and policy failures of an order request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    #[error("invalid side: {side:?} (expected buy or sell)")]
    InvalidSide { side: String },

    #[error("price must be greater than zero")]
    NonPositivePrice,

    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,

    #[error("symbol not allowed: {symbol}")]
    SymbolNotAllowed { symbol: String },
}

impl ValidationError {
    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptySymbol => "empty_symbol",
            ValidationError::InvalidSide { .. } => "invalid_side",
            ValidationError::NonPositivePrice => "non_positive_price",
            ValidationError::NonPositiveQuantity => "non_positive_quantity",
            ValidationError::SymbolNotAllowed { .. } => "symbol_not_allowed",
        }
    }
}

/// Failures reported by the durable order ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A record already holds this idempotency key; nothing was written.
    /// `status` is the holder's status at the time of the conflict.
    #[error("idempotency key already bound to {status} order {existing}")]
    DuplicateIdempotencyKey { existing: OrderId, status: OrderStatus },

    #[error("order not found: {order_id}")]
    NotFound { order_id: OrderId },

    #[error("ledger timed out")]
    Timeout,

    #[error("ledger unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Failures reported by the event publisher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("event serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("publish to {topic} failed: {reason}")]
    Delivery { topic: String, reason: String },

    #[error("publisher unavailable: {reason}")]
    Unavailable { reason: String },
}
