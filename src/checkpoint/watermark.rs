use chrono::{DateTime, NaiveDateTime, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rendering used for every watermark written to the checkpoint store and
/// sent to the upstream API.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Error)]
#[error("invalid watermark '{value}': expected an ISO-8601 UTC timestamp")]
pub struct WatermarkError {
    pub value: String,
}

/// A UTC instant with millisecond precision.
///
/// Watermarks mark the exclusive lower bound of the next poll window and are
/// totally ordered by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(3))
    }

    /// Parse a timestamp as produced by the upstream API or a previous run.
    ///
    /// Accepts RFC 3339 with any fractional precision and offset. A naive
    /// `YYYY-MM-DDTHH:MM:SS[.fff]` without offset is taken as UTC.
    pub fn parse(value: &str) -> Result<Self, WatermarkError> {
        let trimmed = value.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::new(parsed.with_timezone(&Utc)));
        }

        NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::new(naive.and_utc()))
            .map_err(|_| WatermarkError {
                value: value.to_string(),
            })
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn plus_millis(self, millis: i64) -> Self {
        Self(self.0 + chrono::Duration::milliseconds(millis))
    }
}

/// Drop seconds and sub-second precision.
pub fn floor_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0) - chrono::Duration::seconds(i64::from(at.second()))
}

impl From<DateTime<Utc>> for Watermark {
    fn from(at: DateTime<Utc>) -> Self {
        Self::new(at)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WATERMARK_FORMAT))
    }
}

impl FromStr for Watermark {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Watermark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_uses_millisecond_precision() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(Watermark::new(at).to_string(), "2024-03-01T12:30:05.123Z");
    }

    #[test]
    fn test_parse_accepts_upstream_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap()
            + chrono::Duration::milliseconds(120);

        for input in [
            "2024-03-01T12:30:05.120Z",
            "2024-03-01T12:30:05.120000Z",
            "2024-03-01T14:30:05.12+02:00",
            "2024-03-01T12:30:05.120",
        ] {
            let parsed = Watermark::parse(input).unwrap();
            assert_eq!(parsed.as_datetime(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Watermark::parse("yesterday").is_err());
        assert!(Watermark::parse("").is_err());
    }

    #[test]
    fn test_display_parse_is_stable() {
        let wm = Watermark::parse("2023-11-30T23:59:59.999Z").unwrap();
        assert_eq!(Watermark::parse(&wm.to_string()).unwrap(), wm);
    }

    #[test]
    fn test_plus_millis_rolls_over() {
        let wm = Watermark::parse("2023-12-31T23:59:59.999Z").unwrap();
        assert_eq!(wm.plus_millis(1).to_string(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_floor_to_minute() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 8, 41, 37).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(
            floor_to_minute(at),
            Utc.with_ymd_and_hms(2024, 5, 10, 8, 41, 0).unwrap()
        );
    }
}
