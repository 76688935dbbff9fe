//! Common types used across the platform

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the capture device (or session) a batch of images came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Device id used when the client does not send one
    pub const DEFAULT: &'static str = "default";

    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a timestamp as fixed-width RFC 3339 (microseconds, `Z` suffix).
///
/// Stored dates are compared as strings by the document store, so every
/// timestamp must have the same width.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde adapter for timestamps stored in the document store
pub mod iso_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    /// Parse RFC 3339, also accepting naive ISO timestamps written without an offset
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_device_id_defaults_when_blank() {
        assert_eq!(DeviceId::new("   ").as_str(), DeviceId::DEFAULT);
        assert_eq!(DeviceId::new(" greenhouse-2 ").as_str(), "greenhouse-2");
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(123);
        let (fa, fb) = (format_timestamp(&a), format_timestamp(&b));
        assert_eq!(fa, "2025-03-01T08:00:05.000000Z");
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
    }

    #[test]
    fn test_parse_naive_iso() {
        let parsed = iso_timestamp::parse("2025-03-01T08:00:05.250000").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 5).unwrap() + chrono::Duration::milliseconds(250));
    }
}
