//! Hub-wide groups that are not tied to a user, role or ride.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Groups an operator console or in-process consumer can be a member of.
///
/// Membership is granted by the token issuer (the `groups` claim) or by an
/// in-process subscription; clients cannot join these by event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemGroup {
    EmergencyResponders,
    RideMatching,
}

impl SystemGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemGroup::EmergencyResponders => "emergency_responders",
            SystemGroup::RideMatching => "ride_matching",
        }
    }
}

impl fmt::Display for SystemGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emergency_responders" => Ok(SystemGroup::EmergencyResponders),
            "ride_matching" => Ok(SystemGroup::RideMatching),
            other => Err(ValidationError::invalid_format(
                "groups",
                format!("unknown group '{}'", other),
            )),
        }
    }
}
