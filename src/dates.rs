use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

/// Format used for every stored and compared date string.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_DAY_END_HOUR: u32 = 2;

/// Source of "now". Injected everywhere a day boundary is decided so tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Where one streak day ends and the next begins.
///
/// A day runs from `day_end_hour` to `day_end_hour` in `timezone`, so activity
/// at 01:30 with the default hour of 2 still belongs to the previous day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    pub day_end_hour: u32,
    pub timezone: Tz,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            day_end_hour: DEFAULT_DAY_END_HOUR,
            timezone: chrono_tz::UTC,
        }
    }
}

impl DayBoundary {
    pub fn new(day_end_hour: u32, timezone: Tz) -> Self {
        Self { day_end_hour, timezone }
    }

    /// Calendar day of `timestamp` in local time, shifted back one day before the cutoff hour.
    pub fn effective_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let local = timestamp.with_timezone(&self.timezone);
        let day = local.date_naive();
        if local.hour() < self.day_end_hour {
            day.pred_opt().unwrap_or(day)
        } else {
            day
        }
    }

    /// Calendar day of `timestamp` in local time with no offset.
    pub fn raw_day(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.timezone).date_naive()
    }

    pub fn effective_date_of(&self, timestamp: DateTime<Utc>) -> String {
        format_date(self.effective_day(timestamp))
    }

    pub fn raw_date_of(&self, timestamp: DateTime<Utc>) -> String {
        format_date(self.raw_day(timestamp))
    }

    /// The streak day "now" belongs to.
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.effective_day(clock.now())
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Strict `YYYY-MM-DD` parse: zero-padded, nothing trailing.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// The date string one calendar day before `value`, if `value` is a valid date.
pub fn previous_date(value: &str) -> Option<String> {
    parse_date(value)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .map(format_date)
}

/// The date string one calendar day after `value`, if `value` is a valid date.
pub fn next_date(value: &str) -> Option<String> {
    parse_date(value)
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .map(format_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_effective_date_before_cutoff_belongs_to_previous_day() {
        let day = DayBoundary::default();
        assert_eq!(day.effective_date_of(utc(2024, 1, 16, 1, 30)), "2024-01-15");
        assert_eq!(day.raw_date_of(utc(2024, 1, 16, 1, 30)), "2024-01-16");
    }

    #[test]
    fn test_effective_date_at_and_after_cutoff_is_unchanged() {
        let day = DayBoundary::default();
        assert_eq!(day.effective_date_of(utc(2024, 1, 16, 2, 0)), "2024-01-16");
        assert_eq!(day.effective_date_of(utc(2024, 1, 16, 23, 59)), "2024-01-16");
    }

    #[test]
    fn test_effective_date_crosses_month_and_year() {
        let day = DayBoundary::default();
        assert_eq!(day.effective_date_of(utc(2024, 3, 1, 0, 10)), "2024-02-29");
        assert_eq!(day.effective_date_of(utc(2025, 1, 1, 1, 59)), "2024-12-31");
    }

    #[test]
    fn test_zero_cutoff_means_plain_midnight() {
        let day = DayBoundary::new(0, chrono_tz::UTC);
        assert_eq!(day.effective_date_of(utc(2024, 1, 16, 0, 0)), "2024-01-16");
    }

    #[test]
    fn test_cutoff_is_applied_in_local_time() {
        // 18:30 UTC is 01:30 the next day in Jakarta (UTC+7)
        let day = DayBoundary::new(2, chrono_tz::Asia::Jakarta);
        let ts = utc(2024, 1, 15, 18, 30);
        assert_eq!(day.raw_date_of(ts), "2024-01-16");
        assert_eq!(day.effective_date_of(ts), "2024-01-15");

        let later = utc(2024, 1, 15, 19, 30);
        assert_eq!(day.effective_date_of(later), "2024-01-16");
    }

    #[test]
    fn test_today_uses_clock() {
        let day = DayBoundary::default();
        let clock = FixedClock(utc(2024, 6, 10, 1, 0));
        assert_eq!(format_date(day.today(&clock)), "2024-06-09");
        assert_eq!(day.raw_date_of(clock.now()), "2024-06-10");
    }

    #[test]
    fn test_parse_date_is_strict() {
        assert!(parse_date("2024-01-05").is_some());
        assert!(parse_date("2024-1-5").is_none());
        assert!(parse_date("2024-02-30").is_none());
        assert!(parse_date("2024-01-05T00:00").is_none());
        assert!(parse_date("+024-01-05").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_neighbouring_dates() {
        assert_eq!(previous_date("2024-03-01").as_deref(), Some("2024-02-29"));
        assert_eq!(next_date("2023-12-31").as_deref(), Some("2024-01-01"));
        assert_eq!(next_date("garbage"), None);
    }
}
