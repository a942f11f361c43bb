//! Calendar-day handling.
//!
//! A booking always spans exactly one calendar day. Before a day is sent to
//! the remote service it is expanded to `[startOfDay, endOfDay]` in the
//! client's calendar, which is the only normalization guarding against
//! timezone-boundary mismatches between client and server.

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeDelta,
    TimeZone, Utc,
};

/// Milliseconds from local midnight to the last instant of the same day.
const DAY_END_OFFSET_MS: i64 = 86_399_999;

/// The timezone in which calendar days are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Calendar {
    /// The host's local timezone.
    #[default]
    Local,
    /// A fixed UTC offset, independent of the host.
    Fixed(FixedOffset),
}

/// Full-day interval for one calendar date, expressed in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// `startDate` query/body value (RFC 3339, millisecond precision, `Z`).
    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `endDate` query/body value.
    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Calendar {
    /// Fixed-offset calendar from a number of minutes east of UTC.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Calendar::Fixed)
    }

    pub fn day_window(&self, date: NaiveDate) -> DayWindow {
        let midnight = date.and_time(NaiveTime::MIN);
        let start = match self {
            Calendar::Local => resolve(&Local, midnight),
            Calendar::Fixed(offset) => resolve(offset, midnight),
        };

        DayWindow {
            date,
            start,
            end: start + TimeDelta::milliseconds(DAY_END_OFFSET_MS),
        }
    }

    /// Calendar date an instant falls on.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Calendar::Local => instant.with_timezone(&Local).date_naive(),
            Calendar::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }
}

/// Maps a local wall-clock time to UTC. A midnight swallowed by a DST jump
/// resolves to the first valid instant after it.
fn resolve<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn utc_window_covers_the_whole_day() {
        let cal = Calendar::from_offset_minutes(0).unwrap();
        let w = cal.day_window(d(2026, 11, 20));

        assert_eq!(w.start_param(), "2026-11-20T00:00:00.000Z");
        assert_eq!(w.end_param(), "2026-11-20T23:59:59.999Z");
    }

    #[test]
    fn positive_offset_shifts_window_into_previous_utc_day() {
        let cal = Calendar::from_offset_minutes(330).unwrap();
        let w = cal.day_window(d(2026, 11, 20));

        assert_eq!(w.start_param(), "2026-11-19T18:30:00.000Z");
        assert_eq!(w.end_param(), "2026-11-20T18:29:59.999Z");

        // Both ends still belong to the requested calendar day.
        assert_eq!(cal.date_of(w.start), d(2026, 11, 20));
        assert_eq!(cal.date_of(w.end), d(2026, 11, 20));
    }

    #[test]
    fn negative_offset_window() {
        let cal = Calendar::from_offset_minutes(-300).unwrap();
        let w = cal.day_window(d(2026, 1, 1));
        assert_eq!(w.start_param(), "2026-01-01T05:00:00.000Z");
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        assert!(Calendar::from_offset_minutes(24 * 60).is_none());
        assert!(Calendar::from_offset_minutes(i32::MAX).is_none());
    }

    #[test]
    fn parse_date_accepts_iso_days_only() {
        assert_eq!(parse_date("2026-03-09").unwrap(), d(2026, 3, 9));
        assert_eq!(parse_date(" 2026-03-09 ").unwrap(), d(2026, 3, 9));
        assert!(parse_date("09/03/2026").is_err());
        assert!(parse_date("2026-02-30").is_err());
    }
}
