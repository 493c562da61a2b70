//! Order intake service
//!
//! Validates submitted orders, records each as `pending` in the order ledger,
//! publishes an order-accepted event and acknowledges the caller. Retries
//! carrying the same idempotency key return the original order id.

pub mod config;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod publisher;
pub mod readiness;
pub mod router;
pub mod state;
pub mod validator;

pub use orchestrator::{IntakeError, IntakeOrchestrator, Submission};
pub use router::create_router;
pub use state::{AppState, InitError};
