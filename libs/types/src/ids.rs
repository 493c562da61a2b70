//! Identifier types for intake entities
//!
//! Order identifiers use UUID v7 so records sort chronologically and the
//! broker partition key carries its own creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an order
///
/// Always generated server-side; callers never supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Create a new OrderId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Maximum accepted length of an idempotency key, in bytes
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Caller-supplied token deduplicating retried submissions
///
/// Opaque to the service: compared byte-for-byte, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Parse a raw header value.
    ///
    /// Returns `Ok(None)` for an empty value (no idempotency requested) and
    /// `Err` when the value exceeds [`MAX_IDEMPOTENCY_KEY_LEN`].
    pub fn parse(raw: &str) -> Result<Option<Self>, IdempotencyKeyTooLong> {
        if raw.is_empty() {
            return Ok(None);
        }
        if raw.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(IdempotencyKeyTooLong { len: raw.len() });
        }
        Ok(Some(Self(raw.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised by [`IdempotencyKey::parse`] for oversized keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("idempotency key is {len} bytes, limit is {MAX_IDEMPOTENCY_KEY_LEN}")]
pub struct IdempotencyKeyTooLong {
    pub len: usize,
}
