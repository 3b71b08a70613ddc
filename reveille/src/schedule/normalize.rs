//! Turning provider timestamps into local wall-clock instants.

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeZone, Timelike};

use crate::error::{Error, Result};

/// Parse an ISO-8601 timestamp into wall-clock time in `tz`.
///
/// Timestamps carrying `Z` or an explicit offset are converted; naive
/// timestamps are taken to be local already.
pub fn parse_instant<Tz: TimeZone>(raw: &str, tz: &Tz) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(tz).naive_local());
    }

    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| Error::Schedule(format!("unrecognised timestamp {raw:?}")))
}

/// Resolve a bare `HH:MM[:SS]` time of day against `now`.
///
/// Seconds are dropped: alarms are set to the minute. A time that is not
/// strictly in the future rolls over to tomorrow.
pub fn resolve_time_of_day(raw: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let invalid = || Error::Schedule(format!("unrecognised time of day {raw:?}"));

    let trimmed = raw.trim();
    let time = NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| invalid())?
        .with_second(0)
        .ok_or_else(invalid)?;

    let today = now.date().and_time(time);
    if today > now {
        Ok(today)
    } else {
        today.checked_add_days(Days::new(1)).ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate};
    use test_case::test_case;

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn mountain() -> FixedOffset {
        FixedOffset::west_opt(7 * 3600).unwrap()
    }

    #[test_case("2026-03-14T14:00:00Z" ; "utc designator")]
    #[test_case("2026-03-14T14:00:00.250000Z" ; "fractional utc")]
    #[test_case("2026-03-14T14:00:00+00:00" ; "zero offset")]
    #[test_case("2026-03-14T09:00:00-05:00" ; "other offset")]
    fn offset_timestamps_convert_to_local(raw: &str) {
        let local = parse_instant(raw, &mountain()).unwrap();
        assert_eq!(local.date(), at(0, 0, 0).date());
        assert_eq!(local.format("%H:%M").to_string(), "07:00");
    }

    #[test_case("2026-03-14T07:00:00" ; "naive seconds")]
    #[test_case("2026-03-14T07:00" ; "naive minutes")]
    #[test_case("2026-03-14 07:00:00" ; "space separated")]
    fn naive_timestamps_are_already_local(raw: &str) {
        assert_eq!(parse_instant(raw, &mountain()).unwrap(), at(7, 0, 0));
    }

    #[test]
    fn garbage_timestamp_is_an_error() {
        assert!(parse_instant("tomorrow-ish", &mountain()).is_err());
    }

    #[test]
    fn time_of_day_later_today() {
        assert_eq!(resolve_time_of_day("07:00", at(6, 30, 0)).unwrap(), at(7, 0, 0));
    }

    #[test]
    fn time_of_day_already_passed_rolls_to_tomorrow() {
        let wake = resolve_time_of_day("07:00", at(7, 0, 0)).unwrap();
        assert_eq!(wake, at(7, 0, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn time_of_day_seconds_are_dropped() {
        assert_eq!(resolve_time_of_day("07:00:45", at(6, 0, 0)).unwrap(), at(7, 0, 0));
    }

    #[test_case("" ; "empty")]
    #[test_case("7" ; "hour only")]
    #[test_case("25:00" ; "hour out of range")]
    #[test_case("ab:cd" ; "not numbers")]
    #[test_case("07:00:xx:yy" ; "trailing junk")]
    #[test_case("07:00:30:00" ; "extra field")]
    #[test_case("07:60" ; "minute out of range")]
    fn bad_time_of_day(raw: &str) {
        assert!(resolve_time_of_day(raw, at(6, 0, 0)).is_err());
    }
}
