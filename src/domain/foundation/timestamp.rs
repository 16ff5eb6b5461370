//! Timestamp value object for immutable points in time.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Immutable point in time, always UTC.
///
/// Serializes as RFC 3339. Deserializes from either an RFC 3339 string or
/// Unix epoch milliseconds, since mobile clients send both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "WireTimestamp")]
pub struct Timestamp(DateTime<Utc>);

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Rfc3339(DateTime<Utc>),
    UnixMillis(i64),
}

impl TryFrom<WireTimestamp> for Timestamp {
    type Error = String;

    fn try_from(value: WireTimestamp) -> Result<Self, Self::Error> {
        match value {
            WireTimestamp::Rfc3339(dt) => Ok(Self(dt)),
            WireTimestamp::UnixMillis(ms) => Self::from_unix_millis(ms)
                .ok_or_else(|| format!("timestamp {} is out of range", ms)),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from Unix epoch milliseconds.
    ///
    /// Returns `None` when the value is outside chrono's representable range.
    pub fn from_unix_millis(ms: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(ms).single().map(Self)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 rendering used on the wire.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn deserializes_from_rfc3339() {
        let ts: Timestamp = serde_json::from_str(r#""2025-03-01T12:00:00Z""#).unwrap();
        assert_eq!(ts.as_datetime().timestamp(), 1_740_830_400);
    }

    #[test]
    fn deserializes_from_unix_millis() {
        let ts: Timestamp = serde_json::from_str("1740830400000").unwrap();
        assert_eq!(ts.as_datetime().timestamp(), 1_740_830_400);
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<Timestamp, _> = serde_json::from_str(r#""yesterday""#);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let ts = Timestamp::from_unix_millis(0).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#""1970-01-01T00:00:00+00:00""#);
    }
}
