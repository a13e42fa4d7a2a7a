//! Time utility functions

use chrono::{DateTime, Utc};

/// Parse ISO 8601 / RFC 3339 timestamp string to DateTime<Utc>.
///
/// Wire timestamps are display data, not control flow, so an unparseable
/// value degrades to epoch instead of failing the whole span batch.
pub fn parse_iso_timestamp(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(ts, "Invalid ISO timestamp, using epoch");
            DateTime::UNIX_EPOCH
        })
}

/// Strict variant for user-supplied query parameters
pub fn parse_iso_opt(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_iso_timestamp_valid() {
        let dt = parse_iso_timestamp("2026-01-15T10:30:00Z");
        assert_eq!(dt.year(), 2026);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_iso_timestamp_with_offset() {
        let dt = parse_iso_timestamp("2026-01-15T10:30:00+05:00");
        // Converted to UTC: 10:30 - 5:00 offset = 05:30 UTC
        assert_eq!(dt.hour(), 5);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_iso_timestamp_invalid() {
        let dt = parse_iso_timestamp("not-a-timestamp");
        assert_eq!(dt, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_iso_opt() {
        assert!(parse_iso_opt("2026-01-15T10:30:00Z").is_some());
        assert!(parse_iso_opt("yesterday").is_none());
    }
}
