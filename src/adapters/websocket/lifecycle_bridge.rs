//! Bridge from ride-lifecycle domain events to the hub.
//!
//! The booking and trip services publish `ride.*` events on the event bus.
//! This handler keeps the active-ride set in step with them and relays each
//! transition to the ride group as `ride_update`.
//!
//! ```text
//! ride.accepted ─────┐
//! ride.driver_arrived├─▶ add_active_ride ─▶ notify_ride(ride_update)
//! ride.started ──────┘
//! ride.completed ────┐
//! ride.cancelled ────┴─▶ notify_ride(ride_update) ─▶ remove_active_ride
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::foundation::{DomainError, EventEnvelope, OutboundEvent, RideId, UserId};
use crate::domain::ride::ActiveRide;
use crate::ports::{EventHandler, EventSubscriber, RideNotifier};

/// Ride-lifecycle event types the hub reacts to.
pub const RIDE_LIFECYCLE_EVENT_TYPES: &[&str] = &[
    "ride.accepted",
    "ride.driver_arrived",
    "ride.started",
    "ride.completed",
    "ride.cancelled",
];

/// Whether a lifecycle event opens or closes the ride's live phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Active,
    Terminal,
}

fn transition_for(event_type: &str) -> Option<Transition> {
    match event_type {
        "ride.accepted" | "ride.driver_arrived" | "ride.started" => Some(Transition::Active),
        "ride.completed" | "ride.cancelled" => Some(Transition::Terminal),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifecyclePayload {
    ride_id: Option<String>,
    passenger_id: Option<String>,
    driver_id: Option<String>,
}

/// Event handler that drives the hub from ride-lifecycle events.
pub struct RideLifecycleBridge {
    notifier: Arc<dyn RideNotifier>,
}

impl RideLifecycleBridge {
    pub fn new(notifier: Arc<dyn RideNotifier>) -> Self {
        Self { notifier }
    }

    /// Create as an Arc (for sharing with event subscriber).
    pub fn new_shared(notifier: Arc<dyn RideNotifier>) -> Arc<Self> {
        Arc::new(Self::new(notifier))
    }

    /// Subscribes to every ride-lifecycle event type.
    pub fn register(self: &Arc<Self>, subscriber: &dyn EventSubscriber) {
        subscriber.subscribe_all(RIDE_LIFECYCLE_EVENT_TYPES, self.clone());
    }

    fn ride_id(event: &EventEnvelope, payload: &LifecyclePayload) -> Result<RideId, DomainError> {
        let raw = payload
            .ride_id
            .clone()
            .unwrap_or_else(|| event.aggregate_id.clone());
        RideId::new(raw).map_err(|e| e.into())
    }

    fn participants(payload: &LifecyclePayload) -> Result<(UserId, UserId), DomainError> {
        let passenger = payload
            .passenger_id
            .clone()
            .ok_or_else(|| DomainError::validation("passengerId", "Active ride needs a passenger"))?;
        let driver = payload
            .driver_id
            .clone()
            .ok_or_else(|| DomainError::validation("driverId", "Active ride needs a driver"))?;
        Ok((UserId::new(passenger)?, UserId::new(driver)?))
    }

    /// The `ride_update` payload: the event payload plus `rideId` and `status`.
    fn update_payload(event: &EventEnvelope, ride_id: &RideId) -> Value {
        let mut data = match &event.payload {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let status = event
            .event_type
            .strip_prefix("ride.")
            .unwrap_or(&event.event_type);
        data.insert("rideId".to_string(), Value::from(ride_id.as_str()));
        data.insert("status".to_string(), Value::from(status));
        if let Some(correlation_id) = &event.metadata.correlation_id {
            data.insert("correlationId".to_string(), Value::from(correlation_id.as_str()));
        }
        Value::Object(data)
    }
}

#[async_trait]
impl EventHandler for RideLifecycleBridge {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let Some(transition) = transition_for(&event.event_type) else {
            return Ok(());
        };

        let payload: LifecyclePayload = event.payload_as().map_err(|e| {
            DomainError::validation("payload", format!("Unreadable ride event: {}", e))
                .with_detail("event_type", event.event_type.clone())
        })?;
        let ride_id = Self::ride_id(&event, &payload)?;
        let update = Self::update_payload(&event, &ride_id);

        match transition {
            Transition::Active => {
                let (passenger, driver) = Self::participants(&payload)?;
                self.notifier
                    .add_active_ride(ActiveRide::new(ride_id.clone(), passenger, driver))
                    .await;
                self.notifier
                    .notify_ride(&ride_id, OutboundEvent::RideUpdate, update)
                    .await;
            }
            Transition::Terminal => {
                self.notifier
                    .notify_ride(&ride_id, OutboundEvent::RideUpdate, update)
                    .await;
                self.notifier.remove_active_ride(&ride_id).await;
            }
        }

        tracing::debug!(
            event_type = %event.event_type,
            ride_id = %ride_id,
            "Applied ride lifecycle event"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RideLifecycleBridge"
    }
}
