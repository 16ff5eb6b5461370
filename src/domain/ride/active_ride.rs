//! Active ride record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{RideId, Role, UserId};

/// A ride whose passenger and driver are both expected to receive relayed
/// location and status events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRide {
    pub ride_id: RideId,
    pub passenger_id: UserId,
    pub driver_id: UserId,
}

impl ActiveRide {
    pub fn new(ride_id: RideId, passenger_id: UserId, driver_id: UserId) -> Self {
        Self {
            ride_id,
            passenger_id,
            driver_id,
        }
    }

    /// True if `user` participates in this ride in the given role.
    pub fn has_participant(&self, user: &UserId, role: Role) -> bool {
        match role {
            Role::Driver => &self.driver_id == user,
            Role::Passenger => &self.passenger_id == user,
        }
    }

    /// Both participants, passenger first.
    pub fn participants(&self) -> [&UserId; 2] {
        [&self.passenger_id, &self.driver_id]
    }
}
