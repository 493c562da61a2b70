//! Order intake state machine
//!
//! ```text
//! Started ──cached key──────────────────────────────────────► IdempotentReplay
//!    │
//!    ├──invalid──► Rejected
//!    ▼
//! Validated ──insert fails──► (StoreUnavailable)
//!    │        ├─key held by accepted order──────────────────► IdempotentReplay
//!    │        └─key held by pending order──► (InProgress)
//!    ▼
//! LedgerWritten ──publish ok──► Published ──► Completed
//!    │
//!    └──publish fails──► PublishFailed ──mark failed──► Compensated
//! ```
//!
//! Guarantees:
//! - a cached replay performs no ledger or publisher call
//! - a validation failure performs no ledger or publisher call
//! - an event is published only after its `pending` record is written
//! - a publish failure triggers exactly one compensation attempt, never a retry
//! - only a completed intake writes the idempotency cache
//! - a key held by another process is replayed only once a downstream
//!   consumer has moved that order to `accepted`; while it is `pending` its
//!   outcome is unknown and the caller is asked to retry

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use intake_types::errors::{LedgerError, PublishError, ValidationError};
use intake_types::events::OrderAcceptedEvent;
use intake_types::ids::{IdempotencyKey, OrderId};
use intake_types::order::{OrderStatus, PendingOrder};
use thiserror::Error;

use crate::idempotency::IdempotencyStore;
use crate::ledger::OrderLedger;
use crate::models::{CreateOrderRequest, OrderResponse};
use crate::observability::record_compensation_failure;
use crate::publisher::OrderPublisher;
use crate::validator::Validator;

/// Per-request states, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeState {
    Started,
    IdempotentReplay,
    Rejected,
    Validated,
    LedgerWritten,
    Published,
    Completed,
    PublishFailed,
    Compensated,
}

impl IntakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeState::Started => "started",
            IntakeState::IdempotentReplay => "idempotent_replay",
            IntakeState::Rejected => "rejected",
            IntakeState::Validated => "validated",
            IntakeState::LedgerWritten => "ledger_written",
            IntakeState::Published => "published",
            IntakeState::Completed => "completed",
            IntakeState::PublishFailed => "publish_failed",
            IntakeState::Compensated => "compensated",
        }
    }
}

impl fmt::Display for IntakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed rejection returned to the caller
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("invalid request: {0}")]
    Invalid(#[from] ValidationError),

    /// The pending write failed; nothing exists, safe to retry
    #[error("order store unavailable: {0}")]
    StoreUnavailable(LedgerError),

    /// The pending write succeeded but the event was not published
    #[error("order queue unavailable: {0}")]
    QueueUnavailable(PublishError),

    /// Another request holds the key and has not finished; retry later
    #[error("request with this idempotency key is still in progress (order {existing})")]
    InProgress { existing: OrderId },
}

impl IntakeError {
    /// Caller-facing rejection kind
    pub fn kind(&self) -> &'static str {
        match self {
            IntakeError::Invalid(_) => "invalid_request",
            IntakeError::StoreUnavailable(_) => "store_unavailable",
            IntakeError::QueueUnavailable(_) => "queue_unavailable",
            IntakeError::InProgress { .. } => "request_in_progress",
        }
    }
}

/// Successful outcome of [`IntakeOrchestrator::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub response: OrderResponse,
    /// True when the response came from an earlier request with the same key
    pub replayed: bool,
}

pub struct IntakeOrchestrator {
    validator: Validator,
    idempotency: Arc<IdempotencyStore>,
    ledger: Arc<dyn OrderLedger>,
    publisher: Arc<dyn OrderPublisher>,
}

impl IntakeOrchestrator {
    pub fn new(
        validator: Validator,
        idempotency: Arc<IdempotencyStore>,
        ledger: Arc<dyn OrderLedger>,
        publisher: Arc<dyn OrderPublisher>,
    ) -> Self {
        Self {
            validator,
            idempotency,
            ledger,
            publisher,
        }
    }

    pub fn idempotency(&self) -> &Arc<IdempotencyStore> {
        &self.idempotency
    }

    #[tracing::instrument(
        name = "intake.submit",
        skip_all,
        fields(
            idempotency_key = key.as_ref().map(|k| k.as_str()),
            order_id = tracing::field::Empty
        )
    )]
    pub async fn submit(
        &self,
        request: CreateOrderRequest,
        key: Option<IdempotencyKey>,
    ) -> Result<Submission, IntakeError> {
        transition(IntakeState::Started);

        if let Some(key) = &key {
            if let Some(cached) = self.idempotency.lookup(key) {
                tracing::Span::current().record("order_id", tracing::field::display(cached.order_id));
                transition(IntakeState::IdempotentReplay);
                return Ok(Submission {
                    response: cached,
                    replayed: true,
                });
            }
        }

        let valid = match self.validator.validate(&request) {
            Ok(valid) => valid,
            Err(e) => {
                transition(IntakeState::Rejected);
                tracing::info!(reason = e.code(), error = %e, "Order rejected");
                return Err(IntakeError::Invalid(e));
            }
        };
        transition(IntakeState::Validated);

        let order = PendingOrder::new(valid.symbol, valid.side, valid.price, valid.quantity, key.clone());
        tracing::Span::current().record("order_id", tracing::field::display(order.order_id));

        match self.ledger.insert_pending(&order).await {
            Ok(()) => transition(IntakeState::LedgerWritten),
            Err(LedgerError::DuplicateIdempotencyKey { existing, status }) => {
                tracing::Span::current().record("order_id", tracing::field::display(existing));
                if status == OrderStatus::Accepted {
                    transition(IntakeState::IdempotentReplay);
                    return Ok(Submission {
                        response: OrderResponse::accepted(existing),
                        replayed: true,
                    });
                }
                // In flight elsewhere, or left pending by a failed compensation
                tracing::info!(existing_status = status.as_str(), "Idempotency key held by unfinished order");
                return Err(IntakeError::InProgress { existing });
            }
            Err(e) => {
                tracing::error!(error = %e, "Pending order write failed");
                return Err(IntakeError::StoreUnavailable(e));
            }
        }

        let event = OrderAcceptedEvent::from_order(&order, Utc::now());
        if let Err(publish_error) = self.publisher.publish_order_accepted(&event).await {
            transition(IntakeState::PublishFailed);
            tracing::error!(error = %publish_error, "Order event publish failed");
            self.compensate(&order, &publish_error).await;
            return Err(IntakeError::QueueUnavailable(publish_error));
        }
        transition(IntakeState::Published);

        let response = OrderResponse::accepted(order.order_id);
        if let Some(key) = key {
            self.idempotency.store(key, response.clone());
        }
        transition(IntakeState::Completed);

        Ok(Submission {
            response,
            replayed: false,
        })
    }

    /// Best-effort pending -> failed write. Its own failure is reported but
    /// never replaces the publish error seen by the caller.
    async fn compensate(&self, order: &PendingOrder, cause: &PublishError) {
        let reason = format!("publish_failed: {cause}");
        match self.ledger.mark_failed(order.order_id, &reason).await {
            Ok(()) => transition(IntakeState::Compensated),
            Err(e) => {
                record_compensation_failure();
                tracing::error!(
                    order_id = %order.order_id,
                    publish_error = %cause,
                    compensation_error = %e,
                    "Compensation failed; order left pending without a published event"
                );
            }
        }
    }
}

fn transition(state: IntakeState) {
    tracing::debug!(state = state.as_str(), "Intake transition");
}
