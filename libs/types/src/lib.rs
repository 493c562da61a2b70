//! Types library for the order intake service
//!
//! Shared by the intake service and by downstream consumers of the
//! order-accepted event.
//!
//! # Modules
//! - `ids`: Identifiers (OrderId, IdempotencyKey)
//! - `order`: Side, status and the persisted order record
//! - `events`: Broker event payloads
//! - `errors`: Error taxonomy

pub mod ids;
pub mod order;
pub mod events;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::order::*;
    pub use crate::events::*;
    pub use crate::errors::*;
}
