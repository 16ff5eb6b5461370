//! WebSocket adapters for the real-time ride hub.
//!
//! This module holds the broadcast hub: authenticated connections, broadcast
//! groups, inbound event routing and the bridge from ride-lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Event Bus                                    │
//! │   ride.accepted │ ride.started │ ride.completed │ ...               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ subscribes
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    RideLifecycleBridge                               │
//! │   - Keeps the active-ride index current                             │
//! │   - Relays transitions as ride_update                               │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ RideNotifier
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          RideHub                                     │
//! │   AuthenticationGate → ConnectionRegistry → EventRouter             │
//! │                                                                      │
//! │   user:p-1   role:drivers   ride:r-9   emergency_responders         │
//! │   ├── conn-a ├── conn-b     ├── conn-a └── ops-console               │
//! │              └── conn-c     └── conn-b                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - Wire protocol: inbound frames and outbound envelopes
//! - [`queue`] - Per-connection outbound queue with out-of-band close
//! - [`session`] - Per-connection lifecycle state
//! - [`gate`] - Handshake credential check with timeout
//! - [`registry`] - Connections, per-user index and broadcast groups
//! - [`ride_index`] - Active rides and their participants
//! - [`broadcast`] - Fan-out over bounded per-connection queues
//! - [`router`] - Inbound event dispatch
//! - [`hub`] - The composed hub and its `RideNotifier` surface
//! - [`handler`] - Axum WebSocket upgrade handler
//! - [`lifecycle_bridge`] - Bridge between the event bus and the hub

pub mod broadcast;
pub mod gate;
pub mod handler;
pub mod hub;
pub mod lifecycle_bridge;
pub mod messages;
pub mod queue;
pub mod registry;
pub mod ride_index;
pub mod router;
pub mod session;

pub use broadcast::Broadcaster;
pub use gate::AuthenticationGate;
pub use handler::{ws_handler, ConnectParams};
pub use hub::{HubStats, RideHub, Subscription};
pub use lifecycle_bridge::{RideLifecycleBridge, RIDE_LIFECYCLE_EVENT_TYPES};
pub use messages::{ClientMessage, CloseReason, Delivery, ServerMessage};
pub use queue::{outbound_queue, OutboundHandle, OutboundQueue, OutboundSender};
pub use registry::{ConnectionRegistry, GroupKey, Recipient, SystemGroup};
pub use ride_index::ActiveRideIndex;
pub use router::{EventRouter, RouteOutcome, EMERGENCY_LOG_TARGET};
pub use session::ConnectionSession;
