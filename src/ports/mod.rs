//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the hub and the outside world. Adapters implement these ports.
//!
//! - `SessionValidator` - Handshake credential verification (called by the hub)
//! - `RideNotifier` - Push interface the hub exposes to REST/lifecycle services
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - Ride-lifecycle event bus

mod event_publisher;
mod event_subscriber;
mod ride_notifier;
mod session_validator;

pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use ride_notifier::RideNotifier;
pub use session_validator::SessionValidator;
