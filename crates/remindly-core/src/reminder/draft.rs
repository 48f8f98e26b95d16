//! Raw reminder input and its validation.
//!
//! A [`ReminderDraft`] holds what the user typed (counts are still text).
//! [`ReminderDraft::validate`] decides whether it may be saved: errors block,
//! warnings ask for confirmation.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

use super::entity::{ActivationEvents, DaySet, Reminder, ReminderDescription};
use super::id::ReminderId;
use super::interval::{
    truncate_to_minute, DateInterval, ReminderInterval, Repeat, RepeatUnit, TimeInterval,
};
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum ValidationOutcome {
    Success,
    Warning(String),
    Error(String),
}

impl ValidationOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationOutcome::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// One-off window between two dates.
    Date,
    /// Time-of-day window, optionally repeating.
    Time,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderDraft {
    pub title: String,
    pub description: ReminderDescription,
    pub kind: IntervalKind,
    pub earliest: DateTime<Local>,
    pub latest: DateTime<Local>,
    /// Always active, ignoring `earliest`/`latest`.
    pub infinite: bool,
    pub repeating: bool,
    pub repeat_quantity: String,
    pub repeat_unit: RepeatUnit,
    pub occurrences: String,
    pub days: DaySet,
    pub events: ActivationEvents,
}

impl ReminderDraft {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            title: title.into(),
            description: ReminderDescription::default(),
            kind: IntervalKind::Date,
            earliest: now,
            latest: now + Duration::hours(1),
            infinite: false,
            repeating: false,
            repeat_quantity: "1".into(),
            repeat_unit: RepeatUnit::Day,
            occurrences: "1".into(),
            days: DaySet::every_day(),
            events: ActivationEvents::default(),
        }
    }

    /// Check the draft against the reminders already managed.
    ///
    /// `editing` is the id of the reminder being modified, which is exempt
    /// from the duplicate-title check.
    pub fn validate(&self, existing: &[Reminder], editing: Option<ReminderId>) -> ValidationOutcome {
        let title = self.title.trim();
        if title.is_empty() {
            return ValidationOutcome::Error("The title must not be empty.".into());
        }

        if self.occurrences.trim().is_empty() {
            return ValidationOutcome::Error("Enter how many times to be reminded.".into());
        }
        if let Err(message) = self.parse_occurrences() {
            return ValidationOutcome::Error(message);
        }

        let repeat = match self.parse_repeat() {
            Ok(repeat) => repeat,
            Err(message) => return ValidationOutcome::Error(message),
        };

        if let ReminderDescription::Command(command) = &self.description {
            if command.trim().is_empty() {
                return ValidationOutcome::Error("The description command is empty.".into());
            }
        }

        if !self.infinite {
            // Bounds are stored to the minute, so check what will be stored.
            let earliest = truncate_to_minute(self.earliest);
            let latest = truncate_to_minute(self.latest);
            if latest <= earliest {
                return ValidationOutcome::Error(
                    "The latest time must be after the earliest time.".into(),
                );
            }

            if let Some(repeat) = repeat {
                if latest - earliest > repeat.period_from(earliest) {
                    return ValidationOutcome::Error(
                        "The reminder lasts longer than the time between repeats.".into(),
                    );
                }
            }
        }

        let duplicate = existing
            .iter()
            .any(|r| r.title.trim() == title && Some(r.id()) != editing);
        if duplicate {
            return ValidationOutcome::Warning(format!(
                "A reminder titled \"{title}\" already exists."
            ));
        }

        ValidationOutcome::Success
    }

    /// Turn the draft into a reminder. Run [`validate`](Self::validate)
    /// first; this only fails on input validation would have rejected.
    pub fn into_reminder(self, id: ReminderId) -> Result<Reminder, ValidationError> {
        let total = self
            .parse_occurrences()
            .map_err(|message| ValidationError::InvalidValue {
                field: "occurrences".into(),
                message,
            })?;
        let repeat = self
            .parse_repeat()
            .map_err(|message| ValidationError::InvalidValue {
                field: "repeat_quantity".into(),
                message,
            })?;

        let interval = if self.infinite {
            ReminderInterval::Time(TimeInterval::infinite(self.earliest.date_naive()))
        } else {
            match self.kind {
                IntervalKind::Date => {
                    ReminderInterval::Date(DateInterval::new(self.earliest, self.latest))
                }
                IntervalKind::Time => {
                    ReminderInterval::Time(TimeInterval::new(self.earliest, self.latest, repeat))
                }
            }
        };

        Reminder::builder(id)
            .title(self.title.trim())
            .description(self.description)
            .interval(interval)
            .days(self.days)
            .total_occurrences(total)
            .events(self.events)
            .build()
    }

    fn parse_occurrences(&self) -> Result<u32, String> {
        match self.occurrences.trim().parse::<u32>() {
            Ok(0) => Err("Remind at least once.".into()),
            Ok(n) => Ok(n),
            Err(_) => Err(format!("'{}' is not a valid count.", self.occurrences.trim())),
        }
    }

    fn parse_repeat(&self) -> Result<Option<Repeat>, String> {
        if self.infinite {
            return Ok(Some(Repeat::daily()));
        }
        if !self.repeating || self.kind == IntervalKind::Date {
            return Ok(None);
        }
        let quantity = self.repeat_quantity.trim();
        if quantity.is_empty() {
            return Err("Enter how often the reminder repeats.".into());
        }
        match quantity.parse::<u32>() {
            Ok(0) => Err("The repeat interval must be at least 1.".into()),
            Ok(n) => Ok(Some(Repeat::every(n, self.repeat_unit))),
            Err(_) => Err(format!("'{quantity}' is not a valid repeat interval.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repeating_draft(duration_secs: i64) -> ReminderDraft {
        let mut draft = ReminderDraft::new("Drink water");
        draft.kind = IntervalKind::Time;
        draft.repeating = true;
        draft.repeat_quantity = "1".into();
        draft.repeat_unit = RepeatUnit::Minute;
        draft.earliest = truncate_to_minute(draft.earliest);
        draft.latest = draft.earliest + Duration::seconds(duration_secs);
        draft
    }

    #[test]
    fn default_draft_is_valid() {
        assert_eq!(
            ReminderDraft::new("Stand up").validate(&[], None),
            ValidationOutcome::Success
        );
    }

    #[test]
    fn empty_title_is_an_error() {
        assert!(ReminderDraft::new("   ").validate(&[], None).is_error());
    }

    #[test]
    fn zero_occurrences_is_an_error() {
        let mut draft = ReminderDraft::new("x");
        draft.occurrences = "0".into();
        assert!(draft.validate(&[], None).is_error());
        draft.occurrences = "many".into();
        assert!(draft.validate(&[], None).is_error());
    }

    #[test]
    fn zero_duration_is_an_error() {
        let mut draft = ReminderDraft::new("x");
        draft.latest = draft.earliest;
        assert!(draft.validate(&[], None).is_error());
    }

    #[test]
    fn infinite_draft_ignores_bounds() {
        let mut draft = ReminderDraft::new("x");
        draft.infinite = true;
        draft.latest = draft.earliest;
        assert!(draft.validate(&[], None).is_success());
        let reminder = draft.into_reminder(ReminderId::new(1)).unwrap();
        assert!(reminder.interval.is_infinite());
    }

    #[test]
    fn repeat_period_must_cover_duration() {
        assert!(repeating_draft(120).validate(&[], None).is_error());
        assert!(repeating_draft(60).validate(&[], None).is_success());
        // 61 s is stored as one whole minute.
        assert!(repeating_draft(61).validate(&[], None).is_success());
    }

    #[test]
    fn window_shorter_than_a_minute_is_an_error() {
        let mut draft = ReminderDraft::new("x");
        draft.earliest = truncate_to_minute(draft.earliest) + Duration::seconds(10);
        draft.latest = draft.earliest + Duration::seconds(40);
        assert!(draft.validate(&[], None).is_error());

        draft.kind = IntervalKind::Time;
        draft.repeating = true;
        assert!(draft.validate(&[], None).is_error());
    }

    #[test]
    fn editing_own_title_is_not_a_duplicate() {
        let existing = ReminderDraft::new("Walk")
            .into_reminder(ReminderId::new(1))
            .unwrap();
        let draft = ReminderDraft::new("Walk");
        assert!(draft
            .validate(std::slice::from_ref(&existing), Some(existing.id()))
            .is_success());
        assert!(matches!(
            draft.validate(std::slice::from_ref(&existing), None),
            ValidationOutcome::Warning(_)
        ));
    }

    #[test]
    fn into_reminder_keeps_repeat() {
        let reminder = repeating_draft(60).into_reminder(ReminderId::new(3)).unwrap();
        assert_eq!(
            reminder.interval.repeat(),
            Some(Repeat::every(1, RepeatUnit::Minute))
        );
        assert_eq!(reminder.total_occurrences(), 1);
    }
}
