//! Names of the events the hub pushes to clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of outbound event names.
///
/// Collaborators pushing through `RideNotifier` pick one of these; the hub
/// never emits free-form event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundEvent {
    Connected,
    RideUpdate,
    DriverLocation,
    PassengerLocation,
    EmergencyAlert,
    DriverAvailability,
    Error,
    Pong,
}

impl OutboundEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundEvent::Connected => "connected",
            OutboundEvent::RideUpdate => "ride_update",
            OutboundEvent::DriverLocation => "driver_location",
            OutboundEvent::PassengerLocation => "passenger_location",
            OutboundEvent::EmergencyAlert => "emergency_alert",
            OutboundEvent::DriverAvailability => "driver_availability",
            OutboundEvent::Error => "error",
            OutboundEvent::Pong => "pong",
        }
    }
}

impl fmt::Display for OutboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
