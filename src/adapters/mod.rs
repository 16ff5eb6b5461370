//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the hub to external systems:
//! - `auth` - Handshake credential validators (JWT, mock)
//! - `events` - Event bus implementations
//! - `http` - Axum router exposing `/ws`, `/health` and the ride-event ingest
//! - `websocket` - The broadcast hub and its connection handling

pub mod auth;
pub mod events;
pub mod http;
pub mod websocket;

pub use auth::{JwtConfig, JwtSessionValidator, MockSessionValidator};
pub use events::InMemoryEventBus;
pub use websocket::{RideHub, RideLifecycleBridge};
