//! Timestamp parsing for vCenter exports

use chrono::{DateTime, NaiveDateTime, Utc};

/// Formats carrying an explicit UTC offset
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Formats without zone information, read as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse an exported timestamp into UTC
///
/// Returns `None` when no known format matches.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let mut ts = text.trim();
    if ts.is_empty() {
        return None;
    }

    // Exports sometimes append Z after an explicit offset
    if ts.contains('+') && ts.ends_with('Z') {
        ts = &ts[..ts.len() - 1];
    }

    if let Some(parsed) = parse_known(ts) {
        return Some(parsed);
    }

    // Malformed offset: drop it and read the rest as UTC
    let (head, _) = ts.split_once('+')?;
    parse_known(&format!("{}Z", head.trim_end()))
}

fn parse_known(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(ts, f).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(ts, f).ok())
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z"), Some(utc(10, 30, 0)));
        assert_eq!(parse_timestamp("2024-01-15T12:30:00+02:00"), Some(utc(10, 30, 0)));
    }

    #[test]
    fn test_offset_with_trailing_z() {
        assert_eq!(parse_timestamp("2024-01-15T10:30:00+00:00Z"), Some(utc(10, 30, 0)));
    }

    #[test]
    fn test_malformed_offset_falls_back_to_utc() {
        assert_eq!(parse_timestamp("2024-01-15T10:30:00+bogus"), Some(utc(10, 30, 0)));
    }

    #[test]
    fn test_naive_formats() {
        assert_eq!(parse_timestamp("2024-01-15 10:30:00"), Some(utc(10, 30, 0)));
        assert_eq!(
            parse_timestamp("2024-01-15 10:30:00.500").map(|t| t.timestamp()),
            Some(utc(10, 30, 0).timestamp())
        );
        assert_eq!(parse_timestamp("01/15/2024 10:30:00 PM"), Some(utc(22, 30, 0)));
        assert_eq!(parse_timestamp("1/15/2024 10:30 AM"), Some(utc(10, 30, 0)));
        assert_eq!(parse_timestamp("01/15/2024 22:30"), Some(utc(22, 30, 0)));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45 99:00:00"), None);
    }
}
