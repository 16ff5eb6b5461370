//! WebSocket message types for the ride hub.
//!
//! Defines the protocol between the hub and connected clients:
//! - Client → Server: `{"event": "<name>", "data": {...}}` frames, parsed into
//!   the closed [`ClientMessage`] set
//! - Server → Client: `{"event": "<name>", "data": {..., "timestamp"}}`
//!
//! Unknown event names and malformed payloads become `ValidationError`s; the
//! router answers them with an `error` event and keeps the connection open.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{
    OutboundEvent, RideId, Timestamp, ValidationError,
};
use crate::domain::ride::{Coordinates, EmergencyAlert, LocationUpdate, Severity};

// ============================================
// Client → Server Messages
// ============================================

/// Wire envelope of an inbound frame.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// All events a client may send, with validated payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    LocationUpdate(LocationUpdate),

    /// Ride state change relayed verbatim to the ride group.
    RideUpdate {
        ride_id: RideId,
        data: Map<String, Value>,
    },

    EmergencyAlert(EmergencyAlert),

    JoinRide(RideId),

    LeaveRide(RideId),

    DriverAvailable {
        available: bool,
        location: Option<Coordinates>,
    },

    /// Heartbeat request.
    Ping,
}

impl ClientMessage {
    /// Parses a text frame into a typed message.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let frame: InboundFrame = serde_json::from_str(text)
            .map_err(|e| ValidationError::malformed_frame(e.to_string()))?;
        Self::from_parts(&frame.event, frame.data)
    }

    fn from_parts(event: &str, data: Value) -> Result<Self, ValidationError> {
        match event {
            "location_update" => {
                let p: LocationPayload = payload(data)?;
                let update = LocationUpdate::new(
                    required(p.latitude, "latitude")?,
                    required(p.longitude, "longitude")?,
                    p.heading,
                    p.speed,
                    required(p.timestamp, "timestamp")?,
                )?;
                Ok(ClientMessage::LocationUpdate(update))
            }
            "ride_update" => {
                let Value::Object(data) = data else {
                    return Err(ValidationError::invalid_format(
                        "data",
                        "ride_update payload must be an object",
                    ));
                };
                let ride_id = ride_id(data.get("rideId"))?;
                Ok(ClientMessage::RideUpdate { ride_id, data })
            }
            "emergency_alert" => {
                let p: EmergencyPayload = payload(data)?;
                let ride_id = match p.ride_id.as_ref() {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(ride_id(Some(v))?),
                };
                let coordinates = Coordinates::new(
                    required(p.latitude, "latitude")?,
                    required(p.longitude, "longitude")?,
                )?;
                let alert = EmergencyAlert::new(
                    ride_id,
                    required(p.alert_type, "type")?,
                    coordinates,
                    p.description,
                    severity(p.severity)?,
                )?;
                Ok(ClientMessage::EmergencyAlert(alert))
            }
            "join_ride" => {
                let p: RideRefPayload = payload(data)?;
                Ok(ClientMessage::JoinRide(ride_id(p.ride_id.as_ref())?))
            }
            "leave_ride" => {
                let p: RideRefPayload = payload(data)?;
                Ok(ClientMessage::LeaveRide(ride_id(p.ride_id.as_ref())?))
            }
            "driver_available" => {
                let p: AvailabilityPayload = payload(data)?;
                let location = match (p.latitude, p.longitude) {
                    (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
                    (None, None) => None,
                    (Some(_), None) => return Err(ValidationError::missing_field("longitude")),
                    (None, Some(_)) => return Err(ValidationError::missing_field("latitude")),
                };
                Ok(ClientMessage::DriverAvailable {
                    available: p.available.unwrap_or(true),
                    location,
                })
            }
            "ping" => Ok(ClientMessage::Ping),
            other => Err(ValidationError::unknown_event(other)),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::LocationUpdate(_) => "location_update",
            ClientMessage::RideUpdate { .. } => "ride_update",
            ClientMessage::EmergencyAlert(_) => "emergency_alert",
            ClientMessage::JoinRide(_) => "join_ride",
            ClientMessage::LeaveRide(_) => "leave_ride",
            ClientMessage::DriverAvailable { .. } => "driver_available",
            ClientMessage::Ping => "ping",
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocationPayload {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon", alias = "lng")]
    longitude: Option<f64>,
    heading: Option<f64>,
    speed: Option<f64>,
    timestamp: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmergencyPayload {
    ride_id: Option<Value>,
    #[serde(rename = "type")]
    alert_type: Option<String>,
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon", alias = "lng")]
    longitude: Option<f64>,
    description: Option<String>,
    severity: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RideRefPayload {
    ride_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AvailabilityPayload {
    available: Option<bool>,
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon", alias = "lng")]
    longitude: Option<f64>,
}

fn payload<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, ValidationError> {
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|e| ValidationError::invalid_format("data", e.to_string()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::missing_field(field))
}

/// Any present, non-blank severity is accepted; the hub escalates every
/// alert regardless.
fn severity(value: Option<Value>) -> Result<Severity, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::missing_field("severity")),
        Some(Value::String(s)) => Severity::parse(&s),
        Some(Value::Number(n)) => Severity::parse(&n.to_string()),
        Some(_) => Err(ValidationError::invalid_format(
            "severity",
            "must be a string",
        )),
    }
}

/// Event name of a frame that failed to parse, if its envelope was readable.
pub(crate) fn frame_event(text: &str) -> Option<String> {
    serde_json::from_str::<InboundFrame>(text)
        .ok()
        .map(|frame| frame.event)
}

/// Ride ids arrive as strings, though some clients send numeric ids.
fn ride_id(value: Option<&Value>) -> Result<RideId, ValidationError> {
    match value {
        None | Some(Value::Null) => Err(ValidationError::missing_field("rideId")),
        Some(Value::String(s)) => RideId::new(s.as_str()),
        Some(Value::Number(n)) => RideId::new(n.to_string()),
        Some(_) => Err(ValidationError::invalid_format(
            "rideId",
            "must be a string or number",
        )),
    }
}

// ============================================
// Server → Client Messages
// ============================================

/// An outbound event with its payload already stamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerMessage {
    pub event: OutboundEvent,
    pub data: Value,
}

impl ServerMessage {
    /// Builds a message and stamps `timestamp` into the payload.
    ///
    /// Non-object payloads are wrapped as `{"value": ...}` so every payload
    /// on the wire is a JSON object.
    pub fn new(event: OutboundEvent, payload: Value) -> Self {
        let mut data = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        data.insert(
            "timestamp".to_string(),
            Value::String(Timestamp::now().to_rfc3339()),
        );

        Self {
            event,
            data: Value::Object(data),
        }
    }

    /// The `error` event sent back to a client whose event was rejected.
    pub fn error(err: &ValidationError, event: Option<&str>) -> Self {
        let mut payload = Map::new();
        payload.insert("code".to_string(), Value::from(err.code().as_str()));
        payload.insert("message".to_string(), Value::from(err.to_string()));
        if let Some(event) = event {
            payload.insert("event".to_string(), Value::from(event));
        }
        Self::new(OutboundEvent::Error, Value::Object(payload))
    }

    /// Server timestamp stamped at construction.
    pub fn timestamp(&self) -> Option<&str> {
        self.data.get("timestamp").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why the hub closed a connection from its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The same user opened a newer connection.
    Replaced,
}

impl CloseReason {
    /// WebSocket close code in the application range.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Replaced => 4000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Replaced => "replaced by a newer connection",
        }
    }
}

/// Item on a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event(Arc<ServerMessage>),
    Close(CloseReason),
}

impl Delivery {
    /// Returns the message if this delivery carries one.
    pub fn message(&self) -> Option<&ServerMessage> {
        match self {
            Delivery::Event(msg) => Some(msg),
            Delivery::Close(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> String {
        json!({"event": event, "data": data}).to_string()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inbound parsing
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parses_location_update_with_short_names() {
        let text = frame(
            "location_update",
            json!({"lat": 37.77, "lon": -122.42, "heading": 90.0, "timestamp": "2026-01-01T00:00:00Z"}),
        );

        let ClientMessage::LocationUpdate(update) = ClientMessage::parse(&text).unwrap() else {
            panic!("expected location update");
        };
        assert_eq!(update.coordinates.latitude, 37.77);
        assert_eq!(update.heading, Some(90.0));
        assert_eq!(update.speed, None);
    }

    #[test]
    fn location_update_accepts_epoch_millis_timestamp() {
        let text = frame(
            "location_update",
            json!({"latitude": 1.0, "longitude": 2.0, "timestamp": 1_767_225_600_000_i64}),
        );

        assert!(matches!(
            ClientMessage::parse(&text),
            Ok(ClientMessage::LocationUpdate(_))
        ));
    }

    #[test]
    fn location_update_requires_timestamp() {
        let text = frame("location_update", json!({"latitude": 1.0, "longitude": 2.0}));

        assert_eq!(
            ClientMessage::parse(&text),
            Err(ValidationError::missing_field("timestamp"))
        );
    }

    #[test]
    fn location_update_rejects_out_of_range_latitude() {
        let text = frame(
            "location_update",
            json!({"latitude": 91.0, "longitude": 0.0, "timestamp": "2026-01-01T00:00:00Z"}),
        );

        let err = ClientMessage::parse(&text).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPayload);
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn wrong_field_type_is_invalid_payload() {
        let text = frame(
            "location_update",
            json!({"latitude": "north", "longitude": 0.0, "timestamp": "2026-01-01T00:00:00Z"}),
        );

        assert_eq!(
            ClientMessage::parse(&text).unwrap_err().code(),
            ErrorCode::InvalidPayload
        );
    }

    #[test]
    fn ride_update_keeps_payload_verbatim() {
        let text = frame(
            "ride_update",
            json!({"rideId": "r-1", "status": "arriving", "etaSeconds": 120}),
        );

        let ClientMessage::RideUpdate { ride_id, data } = ClientMessage::parse(&text).unwrap()
        else {
            panic!("expected ride update");
        };
        assert_eq!(ride_id.as_str(), "r-1");
        assert_eq!(data.get("etaSeconds"), Some(&json!(120)));
    }

    #[test]
    fn ride_update_without_ride_id_is_rejected() {
        let text = frame("ride_update", json!({"status": "arriving"}));

        assert_eq!(
            ClientMessage::parse(&text),
            Err(ValidationError::missing_field("rideId"))
        );
    }

    #[test]
    fn numeric_ride_id_is_accepted() {
        let text = frame("join_ride", json!({"rideId": 42}));

        assert_eq!(
            ClientMessage::parse(&text),
            Ok(ClientMessage::JoinRide(RideId::new("42").unwrap()))
        );
    }

    #[test]
    fn parses_emergency_alert_without_ride() {
        let text = frame(
            "emergency_alert",
            json!({"type": "accident", "latitude": 1.0, "longitude": 2.0, "severity": "critical"}),
        );

        let ClientMessage::EmergencyAlert(alert) = ClientMessage::parse(&text).unwrap() else {
            panic!("expected emergency alert");
        };
        assert_eq!(alert.ride_id, None);
        assert_eq!(alert.severity, Severity::Critical);
    }

    #[test]
    fn emergency_alert_accepts_unrecognised_severity() {
        for raw in ["HIGH", "urgent", "severe"] {
            let text = frame(
                "emergency_alert",
                json!({"type": "accident", "latitude": 1.0, "longitude": 2.0, "severity": raw}),
            );

            let ClientMessage::EmergencyAlert(alert) = ClientMessage::parse(&text).unwrap() else {
                panic!("expected emergency alert for severity {raw}");
            };
            assert_eq!(alert.severity.as_str().to_ascii_lowercase(), raw.to_ascii_lowercase());
        }
    }

    #[test]
    fn frame_event_reads_name_of_unparseable_payload() {
        let text = frame("emergency_alert", json!({"type": "accident"}));

        assert_eq!(frame_event(&text).as_deref(), Some("emergency_alert"));
        assert_eq!(frame_event("not json"), None);
    }

    #[test]
    fn emergency_alert_requires_severity() {
        let text = frame(
            "emergency_alert",
            json!({"type": "accident", "latitude": 1.0, "longitude": 2.0}),
        );

        assert_eq!(
            ClientMessage::parse(&text),
            Err(ValidationError::missing_field("severity"))
        );
    }

    #[test]
    fn driver_available_defaults_to_available_without_location() {
        let text = frame("driver_available", Value::Null);

        assert_eq!(
            ClientMessage::parse(&text),
            Ok(ClientMessage::DriverAvailable {
                available: true,
                location: None
            })
        );
    }

    #[test]
    fn driver_available_rejects_half_a_location() {
        let text = frame("driver_available", json!({"latitude": 1.0}));

        assert_eq!(
            ClientMessage::parse(&text),
            Err(ValidationError::missing_field("longitude"))
        );
    }

    #[test]
    fn ping_needs_no_data() {
        assert_eq!(
            ClientMessage::parse(r#"{"event":"ping"}"#),
            Ok(ClientMessage::Ping)
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        let text = frame("teleport", json!({}));

        assert_eq!(
            ClientMessage::parse(&text),
            Err(ValidationError::unknown_event("teleport"))
        );
    }

    #[test]
    fn non_json_frame_is_malformed() {
        let err = ClientMessage::parse("hello").unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedFrame);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Outbound messages
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn server_message_stamps_timestamp() {
        let msg = ServerMessage::new(OutboundEvent::RideUpdate, json!({"rideId": "r-1"}));

        assert!(msg.timestamp().is_some());
        assert_eq!(msg.data["rideId"], "r-1");
    }

    #[test]
    fn server_message_wraps_non_object_payload() {
        let msg = ServerMessage::new(OutboundEvent::RideUpdate, json!("arrived"));

        assert_eq!(msg.data["value"], "arrived");
        assert!(msg.timestamp().is_some());
    }

    #[test]
    fn server_message_serializes_event_and_data() {
        let msg = ServerMessage::new(OutboundEvent::Pong, Value::Null);
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["event"], "pong");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn error_message_carries_code_and_event() {
        let msg = ServerMessage::error(&ValidationError::missing_field("rideId"), Some("ride_update"));

        assert_eq!(msg.event, OutboundEvent::Error);
        assert_eq!(msg.data["code"], "INVALID_PAYLOAD");
        assert_eq!(msg.data["event"], "ride_update");
    }

    #[test]
    fn replaced_close_uses_application_code() {
        assert_eq!(CloseReason::Replaced.code(), 4000);
    }
}
