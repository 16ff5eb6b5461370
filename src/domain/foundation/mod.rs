//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the ride hub.

mod auth;
mod connection_state;
mod errors;
mod events;
mod ids;
mod outbound_event;
mod role;
mod system_group;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use connection_state::{ConnectionState, StateMachine};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{EventEnvelope, EventId, EventMetadata};
pub use ids::{ConnectionId, RideId, UserId};
pub use outbound_event::OutboundEvent;
pub use role::Role;
pub use system_group::SystemGroup;
pub use timestamp::Timestamp;
