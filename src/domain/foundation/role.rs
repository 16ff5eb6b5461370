//! Participant role carried by an authenticated connection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Which side of a ride a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
}

impl Role {
    /// Returns the wire name (`passenger` / `driver`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Passenger => "passenger",
            Role::Driver => "driver",
        }
    }

    /// Returns the plural name used for the role broadcast group.
    pub fn group_name(&self) -> &'static str {
        match self {
            Role::Passenger => "passengers",
            Role::Driver => "drivers",
        }
    }

    pub fn is_driver(&self) -> bool {
        matches!(self, Role::Driver)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passenger" => Ok(Role::Passenger),
            "driver" => Ok(Role::Driver),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}
