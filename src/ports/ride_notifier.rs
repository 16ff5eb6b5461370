//! RideNotifier port - how collaborators push into the hub.
//!
//! The REST layer and the ride-lifecycle services receive an
//! `Arc<dyn RideNotifier>` at construction. They never reach for a global
//! hub instance.
//!
//! # Example
//!
//! ```ignore
//! async fn accept_ride(notifier: Arc<dyn RideNotifier>, ride: ActiveRide) {
//!     notifier.add_active_ride(ride.clone()).await;
//!     notifier
//!         .notify_ride(&ride.ride_id, OutboundEvent::RideUpdate, json!({"status": "accepted"}))
//!         .await;
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::{OutboundEvent, RideId, Role, UserId};
use crate::domain::ride::ActiveRide;

/// Push interface exposed by the hub.
///
/// All sends are best-effort: the returned count is how many connections
/// the event was queued for, and zero is not an error.
#[async_trait]
pub trait RideNotifier: Send + Sync {
    /// Direct send to a user's live connection, dropped if not connected.
    async fn notify_user(&self, user_id: &UserId, event: OutboundEvent, payload: Value) -> usize;

    /// Group send to every member of `ride:<ride_id>`.
    async fn notify_ride(&self, ride_id: &RideId, event: OutboundEvent, payload: Value) -> usize;

    /// Group send to every connected driver or every connected passenger.
    async fn broadcast_to_role(&self, role: Role, event: OutboundEvent, payload: Value) -> usize;

    /// Marks a ride active so location updates are relayed between its
    /// participants.
    async fn add_active_ride(&self, ride: ActiveRide);

    /// Removes a ride from the active set. Returns the removed record.
    async fn remove_active_ride(&self, ride_id: &RideId) -> Option<ActiveRide>;
}
