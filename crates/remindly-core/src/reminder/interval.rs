//! Reminder windows and repeat cadences.
//!
//! A reminder is active between an `earliest` and a `latest` instant. Date
//! intervals are one-off absolute windows; time intervals are defined by
//! time-of-day bounds on an anchor day and roll forward by their repeat
//! cadence once the window ends.
//!
//! All bounds are truncated to whole minutes on construction.

use chrono::{
    DateTime, Duration, Local, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl RepeatUnit {
    /// Fixed length in seconds, `None` for calendar units.
    fn fixed_secs(self) -> Option<i64> {
        match self {
            RepeatUnit::Second => Some(1),
            RepeatUnit::Minute => Some(60),
            RepeatUnit::Hour => Some(3600),
            RepeatUnit::Day | RepeatUnit::Week | RepeatUnit::Month => None,
        }
    }
}

impl std::str::FromStr for RepeatUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "second" | "sec" => Ok(RepeatUnit::Second),
            "minute" | "min" => Ok(RepeatUnit::Minute),
            "hour" => Ok(RepeatUnit::Hour),
            "day" => Ok(RepeatUnit::Day),
            "week" => Ok(RepeatUnit::Week),
            "month" => Ok(RepeatUnit::Month),
            other => Err(format!("unknown repeat unit '{other}'")),
        }
    }
}

/// Repeat cadence: `quantity` × `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repeat {
    pub unit: RepeatUnit,
    pub quantity: u32,
}

impl Repeat {
    /// A zero quantity is bumped to one so the cadence always advances.
    pub fn every(quantity: u32, unit: RepeatUnit) -> Self {
        Self {
            unit,
            quantity: quantity.max(1),
        }
    }

    pub fn daily() -> Self {
        Self::every(1, RepeatUnit::Day)
    }

    /// Move `at` forward by one cadence.
    ///
    /// Day, week and month cadences keep the wall-clock time of day.
    pub fn advance(&self, at: DateTime<Local>) -> DateTime<Local> {
        let quantity = i64::from(self.quantity);
        match self.unit {
            RepeatUnit::Second | RepeatUnit::Minute | RepeatUnit::Hour => {
                let secs = self.unit.fixed_secs().unwrap_or(1);
                at + Duration::seconds(secs * quantity)
            }
            RepeatUnit::Day => local_from_naive(at.naive_local() + Duration::days(quantity)),
            RepeatUnit::Week => local_from_naive(at.naive_local() + Duration::weeks(quantity)),
            RepeatUnit::Month => at
                .naive_local()
                .checked_add_months(Months::new(self.quantity))
                .map(local_from_naive)
                .unwrap_or_else(|| at + Duration::days(30 * quantity)),
        }
    }

    /// Length of the cadence starting at `from`.
    pub fn period_from(&self, from: DateTime<Local>) -> Duration {
        self.advance(from) - from
    }
}

/// A time of day where hours ≥ 24 fall on the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };
    pub const END_OF_DAY: TimeOfDay = TimeOfDay { hour: 24, minute: 0 };

    /// Hours up to 47 are accepted.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 48 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Offset from the anchor day's midnight.
    pub fn offset(&self) -> Duration {
        Duration::hours(i64::from(self.hour)) + Duration::minutes(i64::from(self.minute))
    }

    pub fn on(&self, day: NaiveDate) -> NaiveDateTime {
        day.and_time(NaiveTime::MIN) + self.offset()
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
        }
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = String;

    /// Parses `HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{s}'"))?;
        let hour = h.parse::<u32>().map_err(|e| format!("bad hour '{h}': {e}"))?;
        let minute = m.parse::<u32>().map_err(|e| format!("bad minute '{m}': {e}"))?;
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("time out of range: '{s}'"))
    }
}

/// One-off absolute window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    earliest: DateTime<Local>,
    latest: DateTime<Local>,
}

impl DateInterval {
    pub fn new(earliest: DateTime<Local>, latest: DateTime<Local>) -> Self {
        Self {
            earliest: truncate_to_minute(earliest),
            latest: truncate_to_minute(latest),
        }
    }
}

/// Time-of-day window with an optional repeat cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    earliest: DateTime<Local>,
    latest: DateTime<Local>,
    #[serde(default)]
    repeat: Option<Repeat>,
}

impl TimeInterval {
    /// Window between two times of day anchored on `day`.
    ///
    /// A `latest` that falls before `earliest` rolls over to the next day.
    pub fn from_times(
        day: NaiveDate,
        earliest: TimeOfDay,
        latest: TimeOfDay,
        repeat: Option<Repeat>,
    ) -> Self {
        let start = earliest.on(day);
        let mut end = latest.on(day);
        if end < start {
            end += Duration::days(1);
        }
        Self {
            earliest: truncate_to_minute(local_from_naive(start)),
            latest: truncate_to_minute(local_from_naive(end)),
            repeat,
        }
    }

    /// Window between two absolute instants.
    pub fn new(earliest: DateTime<Local>, latest: DateTime<Local>, repeat: Option<Repeat>) -> Self {
        Self {
            earliest: truncate_to_minute(earliest),
            latest: truncate_to_minute(latest),
            repeat,
        }
    }

    /// The always-active sentinel: the whole of `day`, repeating daily.
    pub fn infinite(day: NaiveDate) -> Self {
        Self::from_times(
            day,
            TimeOfDay::MIDNIGHT,
            TimeOfDay::END_OF_DAY,
            Some(Repeat::daily()),
        )
    }

    pub fn is_infinite(&self) -> bool {
        let start = self.earliest.naive_local();
        self.repeat == Some(Repeat::daily())
            && start.time() == NaiveTime::MIN
            && self.latest.naive_local() == start + Duration::days(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReminderInterval {
    Date(DateInterval),
    Time(TimeInterval),
}

impl ReminderInterval {
    pub fn earliest(&self) -> DateTime<Local> {
        match self {
            ReminderInterval::Date(d) => d.earliest,
            ReminderInterval::Time(t) => t.earliest,
        }
    }

    pub fn latest(&self) -> DateTime<Local> {
        match self {
            ReminderInterval::Date(d) => d.latest,
            ReminderInterval::Time(t) => t.latest,
        }
    }

    pub fn repeat(&self) -> Option<Repeat> {
        match self {
            ReminderInterval::Date(_) => None,
            ReminderInterval::Time(t) => t.repeat,
        }
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat().is_some()
    }

    pub fn is_infinite(&self) -> bool {
        match self {
            ReminderInterval::Date(_) => false,
            ReminderInterval::Time(t) => t.is_infinite(),
        }
    }

    /// Window length in seconds. Callers dividing by this must make sure
    /// the interval went through validation first.
    pub fn duration_seconds(&self) -> f64 {
        (self.latest() - self.earliest()).num_milliseconds() as f64 / 1000.0
    }

    /// `earliest <= now < latest`.
    pub fn contains(&self, now: DateTime<Local>) -> bool {
        self.earliest() <= now && now < self.latest()
    }

    pub fn has_ended(&self, now: DateTime<Local>) -> bool {
        now >= self.latest()
    }

    /// The first future cycle of a repeating interval whose window has not
    /// ended at `now`. Always advances at least once. `None` when the
    /// interval does not repeat.
    pub fn next_cycle(&self, now: DateTime<Local>) -> Option<ReminderInterval> {
        let ReminderInterval::Time(t) = self else {
            return None;
        };
        let repeat = t.repeat?;

        let mut earliest = t.earliest;
        let mut latest = t.latest;

        // Fixed-length cadences can jump straight past `now`.
        if let Some(unit_secs) = repeat.unit.fixed_secs() {
            let period = unit_secs * i64::from(repeat.quantity);
            let behind = (now - latest).num_seconds().max(0);
            let steps = behind / period + 1;
            let shift = Duration::seconds(period * steps);
            earliest += shift;
            latest += shift;
            if latest <= now {
                earliest += Duration::seconds(period);
                latest += Duration::seconds(period);
            }
        } else {
            loop {
                earliest = repeat.advance(earliest);
                latest = repeat.advance(latest);
                if latest > now {
                    break;
                }
            }
        }

        Some(ReminderInterval::Time(TimeInterval {
            earliest,
            latest,
            repeat: Some(repeat),
        }))
    }
}

/// Drop seconds and sub-second residue.
pub fn truncate_to_minute(at: DateTime<Local>) -> DateTime<Local> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Resolve a wall-clock time in the local zone. Times inside a DST gap are
/// pushed forward by an hour.
pub(crate) fn local_from_naive(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(first, _) => first,
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| Local.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        local_from_naive(day().and_hms_opt(h, m, s).unwrap())
    }

    #[test]
    fn latest_before_earliest_rolls_to_next_day() {
        let t = TimeInterval::from_times(
            day(),
            TimeOfDay::new(22, 0).unwrap(),
            TimeOfDay::new(2, 0).unwrap(),
            None,
        );
        let interval = ReminderInterval::Time(t);
        assert_eq!(interval.duration_seconds(), 4.0 * 3600.0);
        assert_eq!(interval.latest().date_naive(), day().succ_opt().unwrap());
    }

    #[test]
    fn hours_past_24_land_on_next_day() {
        let t = TimeInterval::from_times(
            day(),
            TimeOfDay::new(23, 0).unwrap(),
            TimeOfDay::new(25, 30).unwrap(),
            None,
        );
        assert_eq!(
            ReminderInterval::Time(t).duration_seconds(),
            2.5 * 3600.0
        );
    }

    #[test]
    fn infinite_sentinel_detected() {
        let interval = ReminderInterval::Time(TimeInterval::infinite(day()));
        assert!(interval.is_infinite());
        assert_eq!(interval.duration_seconds(), 86_400.0);

        let not_daily = TimeInterval::from_times(
            day(),
            TimeOfDay::MIDNIGHT,
            TimeOfDay::END_OF_DAY,
            Some(Repeat::every(2, RepeatUnit::Day)),
        );
        assert!(!ReminderInterval::Time(not_daily).is_infinite());
    }

    #[test]
    fn bounds_are_truncated_to_minutes() {
        let d = DateInterval::new(at(9, 15, 42), at(10, 0, 59));
        let interval = ReminderInterval::Date(d);
        assert_eq!(interval.earliest().second(), 0);
        assert_eq!(interval.latest().second(), 0);
        assert_eq!(interval.earliest().nanosecond(), 0);
    }

    #[test]
    fn contains_is_half_open() {
        let interval = ReminderInterval::Date(DateInterval::new(at(9, 0, 0), at(10, 0, 0)));
        assert!(interval.contains(at(9, 0, 0)));
        assert!(interval.contains(at(9, 59, 59)));
        assert!(!interval.contains(at(10, 0, 0)));
        assert!(interval.has_ended(at(10, 0, 0)));
    }

    #[test]
    fn date_interval_has_no_next_cycle() {
        let interval = ReminderInterval::Date(DateInterval::new(at(9, 0, 0), at(10, 0, 0)));
        assert!(interval.next_cycle(at(11, 0, 0)).is_none());
    }

    #[test]
    fn daily_cycle_skips_missed_days() {
        let t = TimeInterval::from_times(
            day(),
            TimeOfDay::new(9, 0).unwrap(),
            TimeOfDay::new(10, 0).unwrap(),
            Some(Repeat::daily()),
        );
        let three_days_later = at(12, 0, 0) + Duration::days(3);
        let next = ReminderInterval::Time(t).next_cycle(three_days_later).unwrap();
        assert_eq!(next.earliest().date_naive(), day() + Duration::days(4));
        assert_eq!(next.earliest().hour(), 9);
        assert!(!next.has_ended(three_days_later));
    }

    #[test]
    fn minute_cycle_jumps_directly() {
        let t = TimeInterval::new(
            at(9, 0, 0),
            at(9, 1, 0),
            Some(Repeat::every(5, RepeatUnit::Minute)),
        );
        let next = ReminderInterval::Time(t).next_cycle(at(9, 1, 0)).unwrap();
        assert_eq!(next.earliest(), at(9, 5, 0));
        assert_eq!(next.latest(), at(9, 6, 0));

        let far = ReminderInterval::Time(t).next_cycle(at(11, 3, 0)).unwrap();
        assert_eq!(far.earliest(), at(11, 0, 0) + Duration::minutes(5));
        assert!(far.latest() > at(11, 3, 0));
    }

    #[test]
    fn month_cadence_uses_calendar_months() {
        let repeat = Repeat::every(1, RepeatUnit::Month);
        let next = repeat.advance(at(9, 0, 0));
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 4, 12).unwrap());
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn parse_time_of_day_and_units() {
        assert_eq!("07:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(7, 30).unwrap());
        assert!("24:60".parse::<TimeOfDay>().is_err());
        assert_eq!("hours".parse::<RepeatUnit>().unwrap(), RepeatUnit::Hour);
        assert!("fortnight".parse::<RepeatUnit>().is_err());
    }
}
