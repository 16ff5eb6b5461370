//! Ride module - the values the hub relays between riders and drivers.

mod active_ride;
mod availability;
mod emergency;
mod location;

pub use active_ride::ActiveRide;
pub use availability::DriverAvailability;
pub use emergency::{EmergencyAlert, Priority, ReportedEmergency, Severity};
pub use location::{Coordinates, LocationUpdate};
