//! Link filters
//!
//! Pure functions narrowing scraped links down to the configured date and
//! time-of-day windows. Both windows are inclusive on both ends.
//!
//! Time-of-day filtering projects each link onto its UTC hour and minute.
//! A window that crosses midnight (e.g. `22:00`..`02:00`) is not supported:
//! it matches nothing here and is rejected by config validation.

use crate::error::{BookingError, Result};
use crate::link::AppointmentLink;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Inclusive window of absolute instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DateRange {
    #[serde(deserialize_with = "deserialize_instant")]
    pub earliest: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub latest: DateTime<Utc>,
}

/// Inclusive window of UTC times of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "deserialize_time")]
    pub earliest: NaiveTime,
    #[serde(deserialize_with = "deserialize_time")]
    pub latest: NaiveTime,
}

impl DateRange {
    pub fn new(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Self {
        Self { earliest, latest }
    }

    /// Build from two strings, see [`parse_instant`]
    pub fn parse(earliest: &str, latest: &str) -> Result<Self> {
        Ok(Self::new(parse_instant(earliest)?, parse_instant(latest)?))
    }

    pub fn contains(&self, link: &AppointmentLink) -> bool {
        let instant = link.instant();
        self.earliest <= instant && instant <= self.latest
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            earliest: DateTime::<Utc>::UNIX_EPOCH,
            latest: NaiveDate::from_ymd_opt(2069, 12, 31)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl TimeRange {
    pub fn new(earliest: NaiveTime, latest: NaiveTime) -> Self {
        Self { earliest, latest }
    }

    /// Build from two strings, see [`parse_time`]
    pub fn parse(earliest: &str, latest: &str) -> Result<Self> {
        Ok(Self::new(parse_time(earliest)?, parse_time(latest)?))
    }

    pub fn crosses_midnight(&self) -> bool {
        self.earliest > self.latest
    }

    pub fn contains(&self, link: &AppointmentLink) -> bool {
        let projected = project_time_of_day(link);
        self.earliest <= projected && projected <= self.latest
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            earliest: NaiveTime::MIN,
            latest: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.earliest.format("%Y-%m-%d %H:%M"),
            self.latest.format("%Y-%m-%d %H:%M")
        )
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{} UTC",
            self.earliest.format("%H:%M"),
            self.latest.format("%H:%M")
        )
    }
}

/// Hour and minute of the link's instant in UTC; seconds are dropped
pub fn project_time_of_day(link: &AppointmentLink) -> NaiveTime {
    let instant = link.instant();
    NaiveTime::from_hms_opt(instant.hour(), instant.minute(), 0).unwrap_or(NaiveTime::MIN)
}

/// Keep the links whose instant lies in `range`, preserving order
pub fn filter_between_dates(links: &[AppointmentLink], range: &DateRange) -> Vec<AppointmentLink> {
    links
        .iter()
        .filter(|link| range.contains(link))
        .cloned()
        .collect()
}

/// Keep the links whose UTC time of day lies in `range`, preserving order
pub fn filter_between_times(links: &[AppointmentLink], range: &TimeRange) -> Vec<AppointmentLink> {
    links
        .iter()
        .filter(|link| range.contains(link))
        .cloned()
        .collect()
}

fn strip_zone(input: &str) -> &str {
    let trimmed = input.trim();
    for suffix in [" GMT", " UTC", "Z"] {
        if let Some(rest) = trimmed.strip_suffix(suffix) {
            return rest.trim_end();
        }
    }
    trimmed
}

/// Parse an absolute instant.
///
/// Accepts RFC 3339 (`2024-03-01T08:00:00+01:00`), or a UTC date with an
/// optional time and an optional ` GMT`/` UTC` suffix (`2024-03-01`,
/// `2024-03-01 08:00 GMT`). A bare date means midnight UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }

    let value = strip_zone(input);
    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| BookingError::InvalidConfig(format!("unparseable date '{}'", input)))
}

/// Parse a UTC time of day such as `08:00`, `08:00 GMT` or `17:30:00 UTC`
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let value = strip_zone(input);
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| BookingError::InvalidConfig(format!("unparseable time '{}': {}", input, e)))
}

fn deserialize_instant<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_time<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(timestamps: &[i64]) -> Vec<AppointmentLink> {
        timestamps
            .iter()
            .map(|ts| {
                AppointmentLink::parse(format!(
                    "https://service.berlin.de/terminvereinbarung/termin/time/{}/",
                    ts
                ))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_parse_instant_formats() {
        assert_eq!(
            parse_instant("1970-01-01 GMT").unwrap(),
            DateTime::<Utc>::UNIX_EPOCH
        );
        assert_eq!(
            parse_instant("2023-11-14").unwrap().timestamp(),
            1_699_920_000
        );
        assert_eq!(
            parse_instant("2023-11-14 07:00 UTC").unwrap().timestamp(),
            1_699_945_200
        );
        assert_eq!(
            parse_instant("2023-11-14T08:00:00+01:00").unwrap().timestamp(),
            1_699_945_200
        );
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(
            parse_time("08:00 GMT").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_date_filter_bounds_are_inclusive() {
        let input = links(&[1_699_999_999, 1_700_000_000, 1_700_003_600, 1_700_003_601]);
        let range = DateRange::new(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            DateTime::<Utc>::from_timestamp(1_700_003_600, 0).unwrap(),
        );

        let kept = filter_between_dates(&input, &range);
        let kept: Vec<i64> = kept.iter().map(|l| l.timestamp()).collect();
        assert_eq!(kept, vec![1_700_000_000, 1_700_003_600]);
    }

    #[test]
    fn test_date_filter_is_ordered_subset_and_idempotent() {
        let input = links(&[
            1_700_172_800,
            1_699_000_000,
            1_700_000_000,
            1_800_000_000,
            1_700_086_400,
        ]);
        let range = DateRange::parse("2023-11-14", "2023-11-17").unwrap();

        let once = filter_between_dates(&input, &range);
        assert_eq!(
            once.iter().map(|l| l.timestamp()).collect::<Vec<_>>(),
            vec![1_700_172_800, 1_700_000_000, 1_700_086_400]
        );
        for link in &once {
            assert!(range.earliest <= link.instant() && link.instant() <= range.latest);
        }

        let twice = filter_between_dates(&once, &range);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_time_filter_keeps_only_window() {
        // 07:00 and 09:00 UTC on 2023-11-14
        let input = links(&[1_699_945_200, 1_699_952_400]);
        let range = TimeRange::parse("08:00 GMT", "12:00 GMT").unwrap();

        let kept = filter_between_times(&input, &range);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp(), 1_699_952_400);
    }

    #[test]
    fn test_time_filter_on_evening_links() {
        // 22:13:20 and 23:13:20 UTC
        let input = links(&[1_700_000_000, 1_700_003_600]);

        let morning = TimeRange::parse("08:00 GMT", "12:00 GMT").unwrap();
        assert!(filter_between_times(&input, &morning).is_empty());

        let evening = TimeRange::parse("22:00 GMT", "23:00 GMT").unwrap();
        let kept = filter_between_times(&input, &evening);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_time_filter_drops_seconds_before_comparing() {
        // 22:13:20 projects to 22:13
        let input = links(&[1_700_000_000]);
        let range = TimeRange::parse("22:13", "22:13").unwrap();
        assert_eq!(filter_between_times(&input, &range).len(), 1);
    }

    #[test]
    fn test_time_filter_results_within_window_and_idempotent() {
        let input = links(&[
            1_699_920_000,
            1_699_945_200,
            1_699_952_400,
            1_699_966_800,
            1_700_000_000,
        ]);
        let range = TimeRange::parse("07:00", "13:00").unwrap();

        let once = filter_between_times(&input, &range);
        assert_eq!(once.len(), 3);
        for link in &once {
            let t = project_time_of_day(link);
            assert!(range.earliest <= t && t <= range.latest);
        }
        assert_eq!(filter_between_times(&once, &range), once);
    }

    #[test]
    fn test_midnight_crossing_window_is_a_known_limitation() {
        // 23:13 UTC would be inside 22:00..02:00 if wraparound were supported
        let input = links(&[1_700_003_600]);
        let range = TimeRange::parse("22:00", "02:00").unwrap();

        assert!(range.crosses_midnight());
        assert!(filter_between_times(&input, &range).is_empty());
    }

    #[test]
    fn test_default_ranges_accept_everything_reasonable() {
        let input = links(&[1_700_000_000, 1_699_945_200]);
        assert_eq!(filter_between_dates(&input, &DateRange::default()).len(), 2);
        assert_eq!(filter_between_times(&input, &TimeRange::default()).len(), 2);
    }
}
