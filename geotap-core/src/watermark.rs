//! Per-file replication watermarks.
//!
//! A watermark is the modification time of the last fully processed version
//! of a file. Values are compared in UTC; stored values without an offset are
//! read as UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Errors raised while reading a stored watermark.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatermarkError {
    /// The stored value is not an ISO-8601 timestamp.
    #[error("stored watermark {value:?} is not an ISO-8601 timestamp")]
    Parse {
        /// Rejected value.
        value: String,
    },
}

/// Whether a file modified at `modified` was already fully processed.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use geotap_core::should_skip;
///
/// let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
/// assert!(should_skip(Some(later), earlier));
/// assert!(should_skip(Some(later), later));
/// assert!(!should_skip(Some(earlier), later));
/// assert!(!should_skip(None, later));
/// ```
pub fn should_skip(prior: Option<DateTime<Utc>>, modified: DateTime<Utc>) -> bool {
    prior.is_some_and(|watermark| modified <= watermark)
}

/// Watermark to commit after a file completes; never moves backwards.
pub fn advance(prior: Option<DateTime<Utc>>, modified: DateTime<Utc>) -> DateTime<Utc> {
    prior.map_or(modified, |watermark| watermark.max(modified))
}

/// Parse a stored watermark, assuming UTC when no offset is present.
pub fn parse_watermark(raw: &str) -> Result<DateTime<Utc>, WatermarkError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| WatermarkError::Parse {
            value: raw.to_owned(),
        })
}

/// Render a watermark for storage.
pub fn format_watermark(watermark: DateTime<Utc>) -> String {
    watermark.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[case("2024-03-01T10:00:00+00:00", utc(2024, 3, 1, 10))]
    #[case("2024-03-01T12:00:00+02:00", utc(2024, 3, 1, 10))]
    #[case("2024-03-01T10:00:00Z", utc(2024, 3, 1, 10))]
    #[case("2024-03-01T10:00:00", utc(2024, 3, 1, 10))]
    #[case("2024-03-01 10:00:00.000", utc(2024, 3, 1, 10))]
    fn parses_stored_values(#[case] raw: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(parse_watermark(raw), Ok(expected));
    }

    #[rstest]
    fn rejects_garbage() {
        assert_eq!(
            parse_watermark("yesterday"),
            Err(WatermarkError::Parse {
                value: "yesterday".to_owned()
            })
        );
    }

    #[rstest]
    fn formatted_values_round_trip() {
        let value = utc(2023, 12, 31, 23);
        assert_eq!(format_watermark(value), "2023-12-31T23:00:00Z");
        assert_eq!(parse_watermark(&format_watermark(value)), Ok(value));
    }

    #[rstest]
    fn advance_is_monotonic() {
        let old = utc(2024, 1, 1, 0);
        let new = utc(2024, 2, 1, 0);
        assert_eq!(advance(None, old), old);
        assert_eq!(advance(Some(old), new), new);
        assert_eq!(advance(Some(new), old), new);
    }
}
