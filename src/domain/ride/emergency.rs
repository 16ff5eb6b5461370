//! Emergency alerts raised by riders or drivers.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::Coordinates;
use crate::domain::foundation::{RideId, Role, Timestamp, UserId, ValidationError};

/// Severity as reported by the client.
///
/// Known levels match case-insensitively. Any other non-blank value is kept
/// verbatim in `Other`; routing never depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("severity"));
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Other(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Severity::parse(&raw).map_err(de::Error::custom)
    }
}

/// Delivery priority. Every emergency alert travels on the high path
/// regardless of reported severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
}

/// A validated alert as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<RideId>,

    #[serde(rename = "type")]
    pub alert_type: String,

    #[serde(flatten)]
    pub coordinates: Coordinates,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub severity: Severity,
}

impl EmergencyAlert {
    pub fn new(
        ride_id: Option<RideId>,
        alert_type: impl Into<String>,
        coordinates: Coordinates,
        description: Option<String>,
        severity: Severity,
    ) -> Result<Self, ValidationError> {
        let alert_type = alert_type.into();
        if alert_type.trim().is_empty() {
            return Err(ValidationError::empty_field("type"));
        }
        Ok(Self {
            ride_id,
            alert_type,
            coordinates,
            description,
            severity,
        })
    }

    /// Stamps the sender identity and marks the alert for the priority path.
    pub fn report(self, reported_by: UserId, reporter_role: Role) -> ReportedEmergency {
        ReportedEmergency {
            alert: self,
            reported_by,
            reporter_role,
            priority: Priority::High,
            reported_at: Timestamp::now(),
        }
    }
}

/// An alert after the hub stamped it; this is what responders receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedEmergency {
    #[serde(flatten)]
    pub alert: EmergencyAlert,
    pub reported_by: UserId,
    pub reporter_role: Role,
    pub priority: Priority,
    pub reported_at: Timestamp,
}
