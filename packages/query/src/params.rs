//! Parsing of raw request parameters.
//!
//! HTTP query strings arrive as optional text. These helpers turn them into
//! validated values or an [`QueryError::InvalidArgument`], so bad input is
//! rejected before the store is touched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use noise_map_noise_models::GeoPoint;

use crate::QueryError;

/// Parses a search center from raw `lng` / `lat` strings.
///
/// # Errors
///
/// Returns [`QueryError::InvalidArgument`] if either value is missing, is
/// not a number, or is out of geographic range.
pub fn parse_center(lng: Option<&str>, lat: Option<&str>) -> Result<GeoPoint, QueryError> {
    let lng = parse_coordinate("lng", lng)?;
    let lat = parse_coordinate("lat", lat)?;
    GeoPoint::new(lng, lat).map_err(|e| QueryError::invalid(e.to_string()))
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, QueryError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QueryError::invalid(format!("missing required parameter '{name}'")))?;

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| QueryError::invalid(format!("parameter '{name}' is not a number: {raw}")))
}

/// Parses a search radius in whole meters from the leading integer of
/// `raw`, so `"1500.7"` and `"2000m"` read as 1500 and 2000.
///
/// Returns `None` when the value is absent, has no leading digits, or is
/// not positive; the service then applies its default radius.
#[must_use]
pub fn parse_radius(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim_start();
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let meters = unsigned[..digits_end].parse::<u32>().ok()?;
    (meters > 0).then_some(f64::from(meters))
}

/// An optional, inclusive timestamp window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// A window with no bounds.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Creates a window from optional bounds.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] if both bounds are present and
    /// `start > end`.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, QueryError> {
        match (start, end) {
            (Some(s), Some(e)) if s > e => Err(QueryError::invalid(format!(
                "start {} is after end {}",
                s.to_rfc3339(),
                e.to_rfc3339()
            ))),
            _ => Ok(Self { start, end }),
        }
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }
}

/// Which side of a window a timestamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Parses raw `startDate` / `endDate` strings into a [`TimeRange`].
///
/// Accepts RFC 3339 timestamps, zone-less `YYYY-MM-DDTHH:MM:SS` (read as
/// UTC), and plain `YYYY-MM-DD` dates. A plain end date covers that whole
/// day. Blank values are treated as absent.
///
/// # Errors
///
/// Returns [`QueryError::InvalidArgument`] if a supplied value does not
/// parse, or if `start > end`.
pub fn parse_time_range(start: Option<&str>, end: Option<&str>) -> Result<TimeRange, QueryError> {
    let start = parse_bound("startDate", start, Bound::Start)?;
    let end = parse_bound("endDate", end, Bound::End)?;
    TimeRange::new(start, end)
}

fn parse_bound(
    name: &str,
    raw: Option<&str>,
    bound: Bound,
) -> Result<Option<DateTime<Utc>>, QueryError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(naive.and_utc()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = match bound {
            Bound::Start => date.and_hms_opt(0, 0, 0),
            Bound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
        };
        if let Some(naive) = naive {
            return Ok(Some(naive.and_utc()));
        }
    }

    Err(QueryError::invalid(format!(
        "parameter '{name}' is not a valid date: {raw}"
    )))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn center_requires_both_coordinates() {
        assert!(matches!(
            parse_center(None, Some("10")),
            Err(QueryError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_center(Some("10"), Some("  ")),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn center_rejects_non_numeric_and_out_of_range() {
        assert!(parse_center(Some("abc"), Some("10")).is_err());
        assert!(parse_center(Some("NaN"), Some("10")).is_err());
        assert!(parse_center(Some("inf"), Some("10")).is_err());
        assert!(parse_center(Some("181"), Some("10")).is_err());
        assert!(parse_center(Some("10"), Some("-90.5")).is_err());
    }

    #[test]
    fn center_parses_valid_input() {
        let center = parse_center(Some(" -73.98 "), Some("40.75")).unwrap();
        assert!((center.longitude() + 73.98).abs() < f64::EPSILON);
        assert!((center.latitude() - 40.75).abs() < f64::EPSILON);
    }

    #[test]
    fn radius_falls_back_for_bad_values() {
        assert_eq!(parse_radius(None), None);
        assert_eq!(parse_radius(Some("")), None);
        assert_eq!(parse_radius(Some("0")), None);
        assert_eq!(parse_radius(Some("-50")), None);
        assert_eq!(parse_radius(Some("far")), None);
        assert_eq!(parse_radius(Some("2500")), Some(2500.0));
    }

    #[test]
    fn radius_reads_leading_integer() {
        assert_eq!(parse_radius(Some("1500.7")), Some(1500.0));
        assert_eq!(parse_radius(Some("2000m")), Some(2000.0));
        assert_eq!(parse_radius(Some(" +750")), Some(750.0));
        assert_eq!(parse_radius(Some("0.9")), None);
        assert_eq!(parse_radius(Some("m2000")), None);
    }

    #[test]
    fn date_only_bounds_cover_whole_days() {
        let range = parse_time_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(
            range.start(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        let end = range.end().unwrap();
        assert!(end > Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rfc3339_bounds_keep_their_instant() {
        let range = parse_time_range(Some("2024-03-01T12:00:00+02:00"), None).unwrap();
        assert_eq!(
            range.start(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(range.end(), None);
    }

    #[test]
    fn start_after_end_is_rejected() {
        assert!(matches!(
            parse_time_range(Some("2024-02-01"), Some("2024-01-01")),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn same_day_window_is_accepted() {
        assert!(parse_time_range(Some("2024-01-31"), Some("2024-01-31")).is_ok());
    }

    #[test]
    fn unparsable_single_bound_is_rejected() {
        assert!(parse_time_range(Some("yesterday"), None).is_err());
        assert!(parse_time_range(None, Some("2024-13-01")).is_err());
    }

    #[test]
    fn blank_bounds_are_absent() {
        assert_eq!(
            parse_time_range(Some(""), Some(" ")).unwrap(),
            TimeRange::unbounded()
        );
    }
}
