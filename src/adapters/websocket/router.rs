//! Event router: inbound client events to fan-out.
//!
//! | Event              | Fan-out                                            |
//! |--------------------|----------------------------------------------------|
//! | `location_update`  | `driver_location` / `passenger_location` to each ride group where the sender holds that role |
//! | `ride_update`      | `ride:<rideId>`, sender included                   |
//! | `emergency_alert`  | `emergency_responders` and `ride:<rideId>` if set  |
//! | `join_ride`        | registry only                                      |
//! | `leave_ride`       | registry only                                      |
//! | `driver_available` | `ride_matching`, drivers only                      |
//! | `ping`             | `pong` to the sender                               |
//!
//! Rejected events answer the sender with `error`; the connection stays open.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::domain::foundation::{AuthenticatedUser, OutboundEvent, Role, ValidationError};
use crate::domain::ride::{Coordinates, DriverAvailability, EmergencyAlert, LocationUpdate};

use super::broadcast::Broadcaster;
use super::messages::{frame_event, ClientMessage, ServerMessage};
use super::registry::{ConnectionRegistry, GroupKey};
use super::ride_index::ActiveRideIndex;
use super::session::ConnectionSession;

/// Log target for emergency alerts, kept separate so operators can route it.
pub const EMERGENCY_LOG_TARGET: &str = "ride_hub::emergency";

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The session was not in a state that accepts events.
    Ignored,
    /// Queued for this many connections.
    Relayed { recipients: usize },
    /// A group join/leave; `changed` is false for no-ops.
    Membership { changed: bool },
    /// The event was invalid and the sender was told.
    Rejected(ValidationError),
}

#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    rides: Arc<ActiveRideIndex>,
    broadcaster: Broadcaster,
}

impl EventRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rides: Arc<ActiveRideIndex>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            registry,
            rides,
            broadcaster,
        }
    }

    /// Parses and routes one text frame.
    pub fn dispatch(&self, session: &ConnectionSession, text: &str) -> RouteOutcome {
        let Some(user) = accepting_user(session) else {
            return RouteOutcome::Ignored;
        };

        match ClientMessage::parse(text) {
            Ok(message) => self.route(session, user, message),
            Err(err) => {
                let event = frame_event(text);
                if event.as_deref() == Some("emergency_alert") {
                    tracing::error!(
                        target: EMERGENCY_LOG_TARGET,
                        user_id = %user.id,
                        role = %user.role,
                        error = %err,
                        "Unreadable emergency alert"
                    );
                }
                self.reject(session, err, event.as_deref())
            }
        }
    }

    /// Routes an already parsed message.
    pub fn route(
        &self,
        session: &ConnectionSession,
        user: &AuthenticatedUser,
        message: ClientMessage,
    ) -> RouteOutcome {
        let event = message.name();
        let result = match message {
            ClientMessage::LocationUpdate(update) => Ok(self.relay_location(user, update)),
            ClientMessage::RideUpdate { ride_id, data } => {
                let recipients = self.broadcaster.send_to_group(
                    &GroupKey::Ride(ride_id),
                    OutboundEvent::RideUpdate,
                    Value::Object(data),
                );
                Ok(RouteOutcome::Relayed { recipients })
            }
            ClientMessage::EmergencyAlert(alert) => Ok(self.raise_emergency(user, alert)),
            ClientMessage::JoinRide(ride_id) => Ok(RouteOutcome::Membership {
                changed: self.registry.join_ride_group(session.id(), &ride_id),
            }),
            ClientMessage::LeaveRide(ride_id) => Ok(RouteOutcome::Membership {
                changed: self.registry.leave_ride_group(session.id(), &ride_id),
            }),
            ClientMessage::DriverAvailable {
                available,
                location,
            } => self.announce_availability(user, available, location),
            ClientMessage::Ping => {
                let delivered = self
                    .broadcaster
                    .send_to_connection_id(session.id(), ServerMessage::new(OutboundEvent::Pong, Value::Null));
                Ok(RouteOutcome::Relayed {
                    recipients: usize::from(delivered),
                })
            }
        };

        result.unwrap_or_else(|err| self.reject(session, err, Some(event)))
    }

    /// Sends `error` to the session's own connection.
    pub fn reject(
        &self,
        session: &ConnectionSession,
        err: ValidationError,
        event: Option<&str>,
    ) -> RouteOutcome {
        tracing::debug!(
            connection_id = %session.id(),
            code = %err.code(),
            error = %err,
            "Rejected inbound event"
        );
        self.broadcaster
            .send_to_connection_id(session.id(), ServerMessage::error(&err, event));
        RouteOutcome::Rejected(err)
    }

    fn relay_location(&self, user: &AuthenticatedUser, update: LocationUpdate) -> RouteOutcome {
        let (event, id_field) = match user.role {
            Role::Driver => (OutboundEvent::DriverLocation, "driverId"),
            Role::Passenger => (OutboundEvent::PassengerLocation, "passengerId"),
        };

        let mut recipients = 0;
        for ride_id in self.rides.rides_as(&user.id, user.role) {
            let payload = json!({
                id_field: user.id,
                "rideId": ride_id,
                "location": update,
            });
            recipients += self
                .broadcaster
                .send_to_group(&GroupKey::Ride(ride_id), event, payload);
        }

        tracing::trace!(user_id = %user.id, recipients, "Relayed location");
        RouteOutcome::Relayed { recipients }
    }

    fn raise_emergency(&self, user: &AuthenticatedUser, alert: EmergencyAlert) -> RouteOutcome {
        let report = alert.report(user.id.clone(), user.role);

        tracing::error!(
            target: EMERGENCY_LOG_TARGET,
            user_id = %report.reported_by,
            role = %report.reporter_role,
            ride_id = report.alert.ride_id.as_ref().map(|r| r.as_str()),
            alert_type = %report.alert.alert_type,
            severity = %report.alert.severity,
            latitude = report.alert.coordinates.latitude,
            longitude = report.alert.coordinates.longitude,
            "Emergency alert raised"
        );

        let mut groups = vec![GroupKey::EmergencyResponders];
        if let Some(ride_id) = &report.alert.ride_id {
            groups.push(GroupKey::Ride(ride_id.clone()));
        }

        let payload = match serde_json::to_value(&report) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(target: EMERGENCY_LOG_TARGET, error = %e, "Failed to encode emergency alert");
                return RouteOutcome::Relayed { recipients: 0 };
            }
        };

        let recipients = self
            .broadcaster
            .send_to_groups(&groups, OutboundEvent::EmergencyAlert, payload);
        RouteOutcome::Relayed { recipients }
    }

    fn announce_availability(
        &self,
        user: &AuthenticatedUser,
        available: bool,
        location: Option<Coordinates>,
    ) -> Result<RouteOutcome, ValidationError> {
        if !user.is_driver() {
            return Err(ValidationError::RoleMismatch {
                required: Role::Driver,
                actual: user.role,
            });
        }

        let signal = if available {
            DriverAvailability::available(user.id.clone(), location)
        } else {
            DriverAvailability {
                location,
                ..DriverAvailability::offline(user.id.clone())
            }
        };

        Ok(RouteOutcome::Relayed {
            recipients: self.broadcast_availability(&signal),
        })
    }

    /// Sends a driver availability signal to `ride_matching`.
    pub fn broadcast_availability(&self, signal: &DriverAvailability) -> usize {
        match serde_json::to_value(signal) {
            Ok(payload) => self.broadcaster.send_to_group(
                &GroupKey::RideMatching,
                OutboundEvent::DriverAvailability,
                payload,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode driver availability");
                0
            }
        }
    }
}

fn accepting_user(session: &ConnectionSession) -> Option<&AuthenticatedUser> {
    if session.state().accepts_events() {
        session.user()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::messages::Delivery;
    use crate::adapters::websocket::queue::{outbound_queue, OutboundQueue};
    use crate::adapters::websocket::registry::SystemGroup;
    use crate::domain::foundation::{ConnectionId, RideId, UserId};
    use crate::domain::ride::ActiveRide;
    use std::sync::Mutex;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Records target and level of every event emitted while installed.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<(String, tracing::Level)>>>);

    impl<S: tracing::Subscriber> Layer<S> for CapturedLogs {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((meta.target().to_string(), *meta.level()));
        }
    }

    impl CapturedLogs {
        fn errors_on(&self, target: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, level)| t == target && *level == tracing::Level::ERROR)
                .count()
        }
    }

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        rides: Arc<ActiveRideIndex>,
        router: EventRouter,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new());
            let rides = Arc::new(ActiveRideIndex::new());
            let router = EventRouter::new(
                registry.clone(),
                rides.clone(),
                Broadcaster::new(registry.clone()),
            );
            Self {
                registry,
                rides,
                router,
            }
        }

        fn connect(&self, id: &str, role: Role) -> (ConnectionSession, OutboundQueue) {
            let user = AuthenticatedUser::new(UserId::new(id).unwrap(), role);
            let mut session = ConnectionSession::new();
            let (tx, rx) = outbound_queue(16);
            self.registry.admit(session.id(), &user, tx);
            session.mark_authenticated(user).unwrap();
            (session, rx)
        }
    }

    fn next(rx: &mut OutboundQueue) -> ServerMessage {
        match rx.try_recv() {
            Ok(Delivery::Event(msg)) => (*msg).clone(),
            other => panic!("expected event, got {:?}", other),
        }
    }

    fn frame(event: &str, data: Value) -> String {
        json!({"event": event, "data": data}).to_string()
    }

    #[test]
    fn events_from_unauthenticated_session_are_ignored() {
        let fx = Fixture::new();
        let session = ConnectionSession::new();

        assert_eq!(fx.router.dispatch(&session, r#"{"event":"ping"}"#), RouteOutcome::Ignored);
    }

    #[test]
    fn events_after_disconnect_are_ignored() {
        let fx = Fixture::new();
        let (mut session, mut rx) = fx.connect("p-1", Role::Passenger);
        session.mark_disconnected();

        let outcome = fx.router.dispatch(&session, r#"{"event":"ping"}"#);

        assert_eq!(outcome, RouteOutcome::Ignored);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ping_answers_pong() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.connect("p-1", Role::Passenger);

        fx.router.dispatch(&session, r#"{"event":"ping"}"#);

        assert_eq!(next(&mut rx).event, OutboundEvent::Pong);
    }

    #[test]
    fn driver_location_reaches_ride_group_only() {
        let fx = Fixture::new();
        let (driver, _drx) = fx.connect("d-1", Role::Driver);
        let (p1, mut p1_rx) = fx.connect("p-1", Role::Passenger);
        let (_p2, mut p2_rx) = fx.connect("p-2", Role::Passenger);
        let ride = RideId::new("r-1").unwrap();
        fx.rides.add(ActiveRide::new(
            ride.clone(),
            UserId::new("p-1").unwrap(),
            UserId::new("d-1").unwrap(),
        ));
        fx.registry.join_ride_group(driver.id(), &ride);
        fx.registry.join_ride_group(p1.id(), &ride);

        let outcome = fx.router.dispatch(
            &driver,
            &frame("location_update", json!({"latitude": 10.0, "longitude": 20.0, "timestamp": "2026-01-01T00:00:00Z"})),
        );

        assert_eq!(outcome, RouteOutcome::Relayed { recipients: 2 });
        let msg = next(&mut p1_rx);
        assert_eq!(msg.event, OutboundEvent::DriverLocation);
        assert_eq!(msg.data["driverId"], "d-1");
        assert_eq!(msg.data["rideId"], "r-1");
        assert_eq!(msg.data["location"]["latitude"], 10.0);
        assert!(p2_rx.try_recv().is_err());
    }

    #[test]
    fn invalid_location_sends_error_to_sender_only() {
        let fx = Fixture::new();
        let (driver, mut rx) = fx.connect("d-1", Role::Driver);

        let outcome = fx.router.dispatch(
            &driver,
            &frame("location_update", json!({"latitude": 100.0, "longitude": 0.0, "timestamp": "2026-01-01T00:00:00Z"})),
        );

        assert!(matches!(outcome, RouteOutcome::Rejected(ValidationError::OutOfRange { .. })));
        let msg = next(&mut rx);
        assert_eq!(msg.event, OutboundEvent::Error);
        assert_eq!(msg.data["code"], "INVALID_PAYLOAD");
    }

    #[test]
    fn unknown_event_is_rejected_with_error() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.connect("p-1", Role::Passenger);

        let outcome = fx.router.dispatch(&session, &frame("teleport", json!({})));

        assert!(matches!(outcome, RouteOutcome::Rejected(ValidationError::UnknownEvent { .. })));
        assert_eq!(next(&mut rx).data["code"], "UNKNOWN_EVENT");
    }

    #[test]
    fn ride_update_includes_sender() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.connect("d-1", Role::Driver);
        fx.router.dispatch(&session, &frame("join_ride", json!({"rideId": "r-1"})));

        let outcome = fx
            .router
            .dispatch(&session, &frame("ride_update", json!({"rideId": "r-1", "status": "arrived"})));

        assert_eq!(outcome, RouteOutcome::Relayed { recipients: 1 });
        let msg = next(&mut rx);
        assert_eq!(msg.data["status"], "arrived");
        assert!(msg.timestamp().is_some());
    }

    #[test]
    fn join_and_leave_report_membership_changes() {
        let fx = Fixture::new();
        let (session, _rx) = fx.connect("p-1", Role::Passenger);
        let join = frame("join_ride", json!({"rideId": "r-1"}));
        let leave = frame("leave_ride", json!({"rideId": "r-1"}));

        assert_eq!(fx.router.dispatch(&session, &join), RouteOutcome::Membership { changed: true });
        assert_eq!(fx.router.dispatch(&session, &join), RouteOutcome::Membership { changed: false });
        assert_eq!(fx.router.dispatch(&session, &leave), RouteOutcome::Membership { changed: true });
        assert_eq!(fx.router.dispatch(&session, &leave), RouteOutcome::Membership { changed: false });
    }

    #[test]
    fn emergency_without_ride_goes_to_responders_only() {
        let fx = Fixture::new();
        let (reporter, _rx) = fx.connect("p-1", Role::Passenger);
        let (responder, mut responder_rx) = fx.connect("ops-1", Role::Driver);
        fx.registry.join(responder.id(), GroupKey::EmergencyResponders);

        let outcome = fx.router.dispatch(
            &reporter,
            &frame("emergency_alert", json!({"type": "medical", "latitude": 1.0, "longitude": 2.0, "severity": "high"})),
        );

        assert_eq!(outcome, RouteOutcome::Relayed { recipients: 1 });
        let msg = next(&mut responder_rx);
        assert_eq!(msg.event, OutboundEvent::EmergencyAlert);
        assert_eq!(msg.data["reportedBy"], "p-1");
        assert_eq!(msg.data["reporterRole"], "passenger");
        assert_eq!(msg.data["priority"], "high");
        assert_eq!(msg.data["type"], "medical");
    }

    #[test]
    fn unrecognised_severity_still_reaches_responders() {
        let fx = Fixture::new();
        let (reporter, _rx) = fx.connect("d-1", Role::Driver);
        let (responder, mut responder_rx) = fx.connect("ops-1", Role::Driver);
        fx.registry.join(responder.id(), GroupKey::EmergencyResponders);

        let outcome = fx.router.dispatch(
            &reporter,
            &frame("emergency_alert", json!({"type": "accident", "latitude": 1.0, "longitude": 2.0, "severity": "urgent"})),
        );

        assert_eq!(outcome, RouteOutcome::Relayed { recipients: 1 });
        let msg = next(&mut responder_rx);
        assert_eq!(msg.data["severity"], "urgent");
        assert_eq!(msg.data["priority"], "high");
    }

    #[test]
    fn emergency_is_logged_even_without_recipients() {
        let fx = Fixture::new();
        let (reporter, _rx) = fx.connect("p-1", Role::Passenger);
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::registry().with(logs.clone());

        let outcome = tracing::subscriber::with_default(subscriber, || {
            fx.router.dispatch(
                &reporter,
                &frame("emergency_alert", json!({"type": "medical", "latitude": 1.0, "longitude": 2.0, "severity": "critical"})),
            )
        });

        assert_eq!(outcome, RouteOutcome::Relayed { recipients: 0 });
        assert_eq!(logs.errors_on(EMERGENCY_LOG_TARGET), 1);
    }

    #[test]
    fn unreadable_emergency_alert_is_still_logged() {
        let fx = Fixture::new();
        let (reporter, mut rx) = fx.connect("p-1", Role::Passenger);
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::registry().with(logs.clone());

        let outcome = tracing::subscriber::with_default(subscriber, || {
            fx.router
                .dispatch(&reporter, &frame("emergency_alert", json!({"type": "medical"})))
        });

        assert!(matches!(outcome, RouteOutcome::Rejected(_)));
        assert_eq!(logs.errors_on(EMERGENCY_LOG_TARGET), 1);
        assert_eq!(next(&mut rx).data["event"], "emergency_alert");
    }

    #[test]
    fn passenger_cannot_announce_availability() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.connect("p-1", Role::Passenger);

        let outcome = fx.router.dispatch(&session, &frame("driver_available", json!({})));

        assert!(matches!(outcome, RouteOutcome::Rejected(ValidationError::RoleMismatch { .. })));
        let msg = next(&mut rx);
        assert_eq!(msg.data["code"], "FORBIDDEN");
        assert_eq!(msg.data["event"], "driver_available");
    }

    #[test]
    fn driver_availability_goes_to_ride_matching() {
        let fx = Fixture::new();
        let (driver, _rx) = fx.connect("d-1", Role::Driver);
        let (matcher, mut matcher_rx) = outbound_queue(4);
        fx.registry
            .attach(ConnectionId::new(), SystemGroup::RideMatching, matcher.sender);

        fx.router.dispatch(
            &driver,
            &frame("driver_available", json!({"latitude": 1.0, "longitude": 2.0})),
        );

        let msg = next(&mut matcher_rx);
        assert_eq!(msg.event, OutboundEvent::DriverAvailability);
        assert_eq!(msg.data["driverId"], "d-1");
        assert_eq!(msg.data["available"], true);
        assert_eq!(msg.data["location"]["longitude"], 2.0);
    }
}
