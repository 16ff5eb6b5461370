//! Domain layer containing hub vocabulary and ride values.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, roles, timestamps, auth, errors, events)
//! - `ride` - Active rides, locations, emergency alerts, driver availability

pub mod foundation;
pub mod ride;
