//! The ride hub: one explicit handle over registry, ride index and router.
//!
//! A connection goes through the hub in this order:
//!
//! ```text
//! open_session ─▶ authenticate ─▶ connect ─▶ dispatch* ─▶ disconnect
//!   Connecting      (gate)        Authenticated              Disconnected
//! ```
//!
//! The hub is shared as `Arc<RideHub>`. Collaborators that only push into it
//! take `Arc<dyn RideNotifier>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::HubConfig;
use crate::domain::foundation::{
    AuthError, AuthenticatedUser, ConnectionId, ConnectionState, OutboundEvent, RideId, Role,
    UserId, ValidationError,
};
use crate::domain::ride::{ActiveRide, DriverAvailability};
use crate::ports::{RideNotifier, SessionValidator};

use super::broadcast::Broadcaster;
use super::gate::AuthenticationGate;
use super::messages::ServerMessage;
use super::queue::{outbound_queue, OutboundQueue};
use super::registry::{ConnectionRegistry, GroupKey, SystemGroup};
use super::ride_index::ActiveRideIndex;
use super::router::{EventRouter, RouteOutcome};
use super::session::ConnectionSession;

/// A connection-less queue on a system group.
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: OutboundQueue,
}

/// Point-in-time counters for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub subscribers: usize,
    pub active_rides: usize,
}

pub struct RideHub {
    gate: AuthenticationGate,
    registry: Arc<ConnectionRegistry>,
    rides: Arc<ActiveRideIndex>,
    broadcaster: Broadcaster,
    router: EventRouter,
    outbound_buffer: usize,
    max_frame_bytes: usize,
}

impl RideHub {
    pub fn new(
        validator: Arc<dyn SessionValidator>,
        config: &HubConfig,
        handshake_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rides = Arc::new(ActiveRideIndex::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let router = EventRouter::new(Arc::clone(&registry), Arc::clone(&rides), broadcaster.clone());

        Self {
            gate: AuthenticationGate::new(validator, handshake_timeout),
            registry,
            rides,
            broadcaster,
            router,
            outbound_buffer: config.outbound_buffer.max(1),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Starts a new connection attempt.
    pub fn open_session(&self) -> ConnectionSession {
        ConnectionSession::new()
    }

    /// Runs the authentication gate. A failure moves the session to
    /// `Disconnected`; no registry state is created either way.
    pub async fn authenticate(
        &self,
        session: &mut ConnectionSession,
        credential: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        match self.gate.authenticate(credential).await {
            Ok(user) => Ok(user),
            Err(err) => {
                session.mark_disconnected();
                tracing::info!(
                    connection_id = %session.id(),
                    code = err.code(),
                    "Connection refused"
                );
                Err(err)
            }
        }
    }

    /// Admits an authenticated session and returns its outbound queue.
    ///
    /// Evicts any earlier connection of the same user, joins the groups of
    /// the user's active rides and queues the `connected` event.
    pub fn connect(
        &self,
        session: &mut ConnectionSession,
        user: AuthenticatedUser,
    ) -> Result<OutboundQueue, ValidationError> {
        session.mark_authenticated(user.clone())?;
        let id = session.id();

        let (handle, queue) = outbound_queue(self.outbound_buffer);
        if let Some(evicted) = self.registry.admit(id, &user, handle) {
            tracing::info!(
                connection_id = %id,
                evicted = %evicted,
                user_id = %user.id,
                "Replaced earlier connection"
            );
        }

        let rides = self.join_active_rides(id, &user.id, self.rides.rides_for(&user.id));

        self.broadcaster.send_to_connection_id(
            id,
            ServerMessage::new(
                OutboundEvent::Connected,
                json!({
                    "connectionId": id,
                    "userId": user.id,
                    "role": user.role,
                    "systemGroups": user.system_groups,
                    "activeRides": rides,
                }),
            ),
        );

        tracing::info!(
            connection_id = %id,
            user_id = %user.id,
            role = %user.role,
            active_rides = rides.len(),
            "Connection admitted"
        );
        Ok(queue)
    }

    /// Joins a connection to the groups of `candidates`, a snapshot of the
    /// user's rides, and returns the ones it ended up in.
    ///
    /// A ride deactivated between the snapshot and the join would leave the
    /// connection in a group nobody cleans up, so each ride is checked again
    /// after joining.
    fn join_active_rides(
        &self,
        id: ConnectionId,
        user_id: &UserId,
        candidates: impl IntoIterator<Item = RideId>,
    ) -> Vec<RideId> {
        let mut joined = Vec::new();
        for ride_id in candidates {
            self.registry.join_ride_group(id, &ride_id);
            let still_active = self
                .rides
                .get(&ride_id)
                .is_some_and(|ride| ride.participants().contains(&user_id));
            if still_active {
                joined.push(ride_id);
            } else {
                self.registry.leave_ride_group(id, &ride_id);
            }
        }
        joined
    }

    /// Routes one inbound text frame.
    pub fn dispatch(&self, session: &ConnectionSession, text: &str) -> RouteOutcome {
        self.router.dispatch(session, text)
    }

    /// Answers a frame that was refused before parsing (binary, oversized).
    pub fn reject_frame(&self, session: &ConnectionSession, err: ValidationError) -> RouteOutcome {
        if !session.state().accepts_events() {
            return RouteOutcome::Ignored;
        }
        self.router.reject(session, err, None)
    }

    /// Tears a session down. Runs at most once per session; later calls
    /// return false.
    ///
    /// A departing driver is announced offline to `ride_matching` unless a
    /// newer connection of the same driver has already taken over.
    pub fn disconnect(&self, session: &mut ConnectionSession) -> bool {
        let was_admitted = session.state() == ConnectionState::Authenticated;
        if !session.mark_disconnected() {
            return false;
        }

        self.registry.remove(session.id());

        if let (true, Some(user)) = (was_admitted, session.user()) {
            let superseded = self.registry.connection_for_user(&user.id).is_some();
            if user.is_driver() && !superseded {
                self.router
                    .broadcast_availability(&DriverAvailability::offline(user.id.clone()));
            }
            tracing::info!(
                connection_id = %session.id(),
                user_id = %user.id,
                superseded,
                "Connection closed"
            );
        }
        true
    }

    /// Opens a connection-less queue on a system group, for in-process
    /// consumers such as ride matching or responder dispatch.
    pub fn subscribe(&self, group: SystemGroup) -> Subscription {
        let id = ConnectionId::new();
        let (handle, receiver) = outbound_queue(self.outbound_buffer);
        self.registry.attach(id, group, handle.sender);
        tracing::debug!(subscription_id = %id, group = %GroupKey::from(group), "System subscriber attached");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        self.registry.remove(id).is_some()
    }

    pub fn stats(&self) -> HubStats {
        let connections = self.registry.user_count();
        HubStats {
            connections,
            subscribers: self.registry.connection_count().saturating_sub(connections),
            active_rides: self.rides.len(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn active_rides(&self) -> &ActiveRideIndex {
        &self.rides
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn activate_ride(&self, ride: ActiveRide) {
        if let Some(previous) = self.rides.add(ride.clone()) {
            for user in previous.participants() {
                if !ride.participants().contains(&user) {
                    self.registry.remove_user_from_ride(user, &previous.ride_id);
                }
            }
        }
        for user in ride.participants() {
            self.registry.join_user_to_ride(user, &ride.ride_id);
        }
        tracing::info!(
            ride_id = %ride.ride_id,
            passenger_id = %ride.passenger_id,
            driver_id = %ride.driver_id,
            "Ride active"
        );
    }

    fn deactivate_ride(&self, ride_id: &RideId) -> Option<ActiveRide> {
        let ride = self.rides.remove(ride_id)?;
        for user in ride.participants() {
            self.registry.remove_user_from_ride(user, ride_id);
        }
        tracing::info!(ride_id = %ride_id, "Ride inactive");
        Some(ride)
    }
}

#[async_trait]
impl RideNotifier for RideHub {
    async fn notify_user(&self, user_id: &UserId, event: OutboundEvent, payload: Value) -> usize {
        self.broadcaster.send_to_user(user_id, event, payload)
    }

    async fn notify_ride(&self, ride_id: &RideId, event: OutboundEvent, payload: Value) -> usize {
        self.broadcaster
            .send_to_group(&GroupKey::Ride(ride_id.clone()), event, payload)
    }

    async fn broadcast_to_role(&self, role: Role, event: OutboundEvent, payload: Value) -> usize {
        self.broadcaster
            .send_to_group(&GroupKey::Role(role), event, payload)
    }

    async fn add_active_ride(&self, ride: ActiveRide) {
        self.activate_ride(ride);
    }

    async fn remove_active_ride(&self, ride_id: &RideId) -> Option<ActiveRide> {
        self.deactivate_ride(ride_id)
    }
}
