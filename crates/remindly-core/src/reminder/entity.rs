use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::id::ReminderId;
use super::interval::{DateInterval, ReminderInterval, TimeInterval};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderState {
    Upcoming,
    Started,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum ActivationHistory {
    #[default]
    None,
    LastActivated(DateTime<Local>),
    FinalActivation(DateTime<Local>),
}

impl ActivationHistory {
    pub fn last_activation(&self) -> Option<DateTime<Local>> {
        match self {
            ActivationHistory::None => None,
            ActivationHistory::LastActivated(at) | ActivationHistory::FinalActivation(at) => {
                Some(*at)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ReminderDescription {
    /// Shown as-is.
    Text(String),
    /// Shell command whose stdout becomes the description at activation time.
    Command(String),
}

impl Default for ReminderDescription {
    fn default() -> Self {
        ReminderDescription::Text(String::new())
    }
}

/// Side effects attached to an activation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationEvents {
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub show_when_active: bool,
    #[serde(default)]
    pub command: Option<String>,
}

/// Weekdays on which a reminder may fire. Empty means every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaySet(u8);

impl DaySet {
    pub fn every_day() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_monday());
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 == 0 || self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_every_day(&self) -> bool {
        self.0 == 0 || self.0 == 0b111_1111
    }

    pub fn days(&self) -> Vec<Weekday> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .filter(|d| self.contains(*d))
        .collect()
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = DaySet::every_day();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

/// A reminder. Identity is the [`ReminderId`]; everything else is mutable
/// through the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    id: ReminderId,
    pub title: String,
    #[serde(default)]
    pub description: ReminderDescription,
    pub interval: ReminderInterval,
    #[serde(default)]
    pub days: DaySet,
    occurrences: u32,
    total_occurrences: u32,
    #[serde(default)]
    pub events: ActivationEvents,
    state: ReminderState,
    #[serde(default)]
    history: ActivationHistory,
}

impl Reminder {
    pub fn builder(id: ReminderId) -> ReminderBuilder {
        ReminderBuilder::new(id)
    }

    pub fn id(&self) -> ReminderId {
        self.id
    }

    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn history(&self) -> ActivationHistory {
        self.history
    }

    pub fn occurrences(&self) -> u32 {
        self.occurrences
    }

    pub fn total_occurrences(&self) -> u32 {
        self.total_occurrences
    }

    pub fn occurrences_left(&self) -> u32 {
        self.total_occurrences.saturating_sub(self.occurrences)
    }

    pub fn is_started(&self) -> bool {
        self.state == ReminderState::Started
    }

    pub fn is_finished(&self) -> bool {
        self.state == ReminderState::Finished
    }

    // ── Transitions (manager only) ───────────────────────────────────

    pub(crate) fn mark_started(&mut self) {
        if self.state == ReminderState::Upcoming {
            self.state = ReminderState::Started;
        }
    }

    /// A reminder stored as started lost its activator with the process.
    pub(crate) fn mark_interrupted(&mut self) {
        if self.state == ReminderState::Started {
            self.state = ReminderState::Upcoming;
        }
    }

    /// Pull a hand-edited count back under the total.
    pub(crate) fn clamp_occurrences(&mut self) {
        self.occurrences = self.occurrences.min(self.total_occurrences);
    }

    pub(crate) fn mark_finished(&mut self) {
        self.state = ReminderState::Finished;
    }

    /// Count one activation. Saturates at the configured total.
    pub(crate) fn record_activation(&mut self, at: DateTime<Local>, is_final: bool) {
        if self.occurrences < self.total_occurrences {
            self.occurrences += 1;
        }
        self.history = if is_final {
            ActivationHistory::FinalActivation(at)
        } else {
            ActivationHistory::LastActivated(at)
        };
    }

    /// Move a repeating reminder into its next window and start the cycle
    /// over. Returns `false` when the interval does not repeat.
    pub(crate) fn advance_to_next_cycle(&mut self, now: DateTime<Local>) -> bool {
        match self.interval.next_cycle(now) {
            Some(next) => {
                self.interval = next;
                self.occurrences = 0;
                self.state = ReminderState::Upcoming;
                true
            }
            None => false,
        }
    }

    /// Ordering used for reminder listings: earliest start, then id.
    pub fn schedule_cmp(&self, other: &Reminder) -> Ordering {
        self.interval
            .earliest()
            .cmp(&other.interval.earliest())
            .then(self.id.cmp(&other.id))
    }
}

impl PartialEq for Reminder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Reminder {}

/// Builder for [`Reminder`]. `title`, `interval` and `total_occurrences`
/// are mandatory.
#[derive(Debug, Clone)]
pub struct ReminderBuilder {
    id: ReminderId,
    title: Option<String>,
    description: ReminderDescription,
    interval: Option<ReminderInterval>,
    days: DaySet,
    occurrences: u32,
    total_occurrences: Option<u32>,
    events: ActivationEvents,
}

impl ReminderBuilder {
    pub fn new(id: ReminderId) -> Self {
        Self {
            id,
            title: None,
            description: ReminderDescription::default(),
            interval: None,
            days: DaySet::every_day(),
            occurrences: 0,
            total_occurrences: None,
            events: ActivationEvents::default(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: ReminderDescription) -> Self {
        self.description = description;
        self
    }

    pub fn interval(mut self, interval: ReminderInterval) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn date_interval(self, earliest: DateTime<Local>, latest: DateTime<Local>) -> Self {
        self.interval(ReminderInterval::Date(DateInterval::new(earliest, latest)))
    }

    pub fn time_interval(self, interval: TimeInterval) -> Self {
        self.interval(ReminderInterval::Time(interval))
    }

    /// Always active: the whole of `day`, rolling over daily.
    pub fn infinite(self, day: NaiveDate) -> Self {
        self.time_interval(TimeInterval::infinite(day))
    }

    /// Fire exactly once inside the minute starting at `at`.
    pub fn non_random(self, at: DateTime<Local>) -> Self {
        self.date_interval(at, at + chrono::Duration::minutes(1))
            .total_occurrences(1)
    }

    pub fn days(mut self, days: DaySet) -> Self {
        self.days = days;
        self
    }

    pub fn occurrences(mut self, occurrences: u32) -> Self {
        self.occurrences = occurrences;
        self
    }

    pub fn total_occurrences(mut self, total: u32) -> Self {
        self.total_occurrences = Some(total);
        self
    }

    pub fn events(mut self, events: ActivationEvents) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> Result<Reminder, ValidationError> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or(ValidationError::MissingField("title"))?;
        let interval = self.interval.ok_or(ValidationError::MissingField("interval"))?;
        let total = self
            .total_occurrences
            .ok_or(ValidationError::MissingField("total_occurrences"))?;

        if interval.latest() < interval.earliest() {
            return Err(ValidationError::InvalidTimeRange {
                earliest: interval.earliest().to_rfc3339(),
                latest: interval.latest().to_rfc3339(),
            });
        }

        Ok(Reminder {
            id: self.id,
            title,
            description: self.description,
            interval,
            days: self.days,
            occurrences: self.occurrences.min(total),
            total_occurrences: total,
            events: self.events,
            state: ReminderState::Upcoming,
            history: ActivationHistory::None,
        })
    }
}

/// Weekday of `at` in the local zone.
pub(crate) fn weekday_of(at: DateTime<Local>) -> Weekday {
    at.weekday()
}
