//! Location value objects.
//!
//! Locations are transient: validated on receipt, relayed, and dropped.
//! Nothing here is persisted.

use serde::Serialize;

use crate::domain::foundation::{Timestamp, ValidationError};

const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
const HEADING_RANGE: (f64, f64) = (0.0, 360.0);

fn check_range(field: &str, value: f64, (min, max): (f64, f64)) -> Result<f64, ValidationError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::out_of_range(field, min, max, value))
    }
}

/// A validated WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            latitude: check_range("latitude", latitude, LATITUDE_RANGE)?,
            longitude: check_range("longitude", longitude, LONGITUDE_RANGE)?,
        })
    }
}

/// A single position report from a connected client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    #[serde(flatten)]
    pub coordinates: Coordinates,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// When the client took the reading.
    pub recorded_at: Timestamp,
}

impl LocationUpdate {
    /// Validates every field of a position report.
    ///
    /// Heading must be within `[0, 360]` and speed must be non-negative
    /// when present.
    pub fn new(
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        speed: Option<f64>,
        recorded_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let coordinates = Coordinates::new(latitude, longitude)?;
        let heading = heading
            .map(|h| check_range("heading", h, HEADING_RANGE))
            .transpose()?;
        let speed = speed
            .map(|s| check_range("speed", s, (0.0, f64::MAX)))
            .transpose()?;

        Ok(Self {
            coordinates,
            heading,
            speed,
            recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at() -> Timestamp {
        Timestamp::now()
    }

    #[test]
    fn accepts_boundary_values() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn rejects_latitude_out_of_range() {
        let err = Coordinates::new(90.1, 0.0).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "latitude"));
    }

    #[test]
    fn rejects_longitude_out_of_range() {
        let err = Coordinates::new(0.0, -180.5).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "longitude"));
    }

    #[test]
    fn rejects_nan() {
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn heading_and_speed_are_optional() {
        let update = LocationUpdate::new(37.0, -122.0, None, None, at()).unwrap();
        assert_eq!(update.heading, None);
        assert_eq!(update.speed, None);
    }

    #[test]
    fn rejects_heading_over_360() {
        assert!(LocationUpdate::new(37.0, -122.0, Some(361.0), None, at()).is_err());
    }

    #[test]
    fn rejects_negative_speed() {
        assert!(LocationUpdate::new(37.0, -122.0, None, Some(-0.1), at()).is_err());
    }

    #[test]
    fn serializes_flat_with_camel_case() {
        let update = LocationUpdate::new(37.0, -122.0, Some(90.0), None, at()).unwrap();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["latitude"], 37.0);
        assert_eq!(json["longitude"], -122.0);
        assert_eq!(json["heading"], 90.0);
        assert!(json.get("speed").is_none());
        assert!(json.get("recordedAt").is_some());
    }

    proptest! {
        #[test]
        fn any_in_range_pair_is_accepted(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert!(Coordinates::new(lat, lon).is_ok());
        }

        #[test]
        fn latitude_beyond_poles_is_rejected(lat in 90.000_001f64..1_000.0, lon in -180.0f64..=180.0) {
            prop_assert!(Coordinates::new(lat, lon).is_err());
            prop_assert!(Coordinates::new(-lat, lon).is_err());
        }

        #[test]
        fn any_non_negative_speed_is_accepted(speed in 0.0f64..500.0) {
            prop_assert!(LocationUpdate::new(0.0, 0.0, None, Some(speed), Timestamp::now()).is_ok());
        }
    }
}
