//! Driver availability signal consumed by ride matching.

use serde::Serialize;

use super::Coordinates;
use crate::domain::foundation::UserId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAvailability {
    pub driver_id: UserId,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
}

impl DriverAvailability {
    pub fn available(driver_id: UserId, location: Option<Coordinates>) -> Self {
        Self {
            driver_id,
            available: true,
            location,
        }
    }

    /// Emitted when a driver's connection goes away.
    pub fn offline(driver_id: UserId) -> Self {
        Self {
            driver_id,
            available: false,
            location: None,
        }
    }
}
