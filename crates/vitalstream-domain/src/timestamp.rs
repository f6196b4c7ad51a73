use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds-vs-seconds cutover: epoch values at or above this are taken
/// as milliseconds (2001-09-09 in ms, year ~33658 in seconds).
const MILLIS_CUTOVER: i64 = 1_000_000_000_000;

/// Parses a device-reported capture time.
///
/// Accepts ISO-8601 / RFC 3339 strings, Unix seconds, and Unix milliseconds
/// (fractional seconds allowed). Returns `None` for anything unparseable;
/// the normalizer substitutes the current instant and flags the event.
pub fn parse_device_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(numeric) = trimmed.parse::<f64>() {
        if !numeric.is_finite() || numeric < 0.0 {
            return None;
        }
        let millis = if numeric >= MILLIS_CUTOVER as f64 {
            numeric
        } else {
            numeric * 1000.0
        };
        return Utc.timestamp_millis_opt(millis as i64).single();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_8601() {
        let ts = parse_device_timestamp("2024-01-15T10:30:00.000Z").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_705_314_600_000);
    }

    #[test]
    fn parses_iso_8601_with_offset() {
        let ts = parse_device_timestamp("2024-01-15T12:30:00+02:00").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_705_314_600_000);
    }

    #[test]
    fn parses_unix_seconds() {
        let ts = parse_device_timestamp("1705314600").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_705_314_600_000);
    }

    #[test]
    fn parses_unix_milliseconds() {
        let ts = parse_device_timestamp("1705314600000").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_705_314_600_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_device_timestamp("not-a-time").is_none());
        assert!(parse_device_timestamp("").is_none());
        assert!(parse_device_timestamp("-42").is_none());
        assert!(parse_device_timestamp("NaN").is_none());
    }
}
