//! Ride Hub - Real-time broadcast hub for ride-hailing clients
//!
//! Passengers, drivers and operator consoles hold one authenticated WebSocket
//! each. The hub relays live locations and ride-state changes between the
//! participants of a ride, fans emergency alerts out to responders, and lets
//! booking services push notifications to users, rides and roles.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
