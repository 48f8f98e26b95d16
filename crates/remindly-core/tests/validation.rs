//! Reminder input validation and construction.

use chrono::{Duration, Local, NaiveDate, TimeZone, Timelike};
use remindly_core::reminder::{TimeInterval, TimeOfDay};
use remindly_core::{
    IntervalKind, Reminder, ReminderDraft, ReminderId, ReminderInterval, RepeatUnit,
    ValidationOutcome,
};

fn at(h: u32, m: u32, s: u32) -> chrono::DateTime<Local> {
    Local.with_ymd_and_hms(2026, 5, 4, h, m, s).unwrap()
}

fn assert_whole_minutes(interval: &ReminderInterval) {
    for bound in [interval.earliest(), interval.latest()] {
        assert_eq!(bound.second(), 0, "{bound} has seconds");
        assert_eq!(bound.nanosecond(), 0, "{bound} has sub-second residue");
    }
}

// ============================================================================
// Validation outcomes
// ============================================================================

#[test]
fn empty_occurrences_is_an_error() {
    let mut draft = ReminderDraft::new("Drink water");
    draft.occurrences = String::new();
    assert!(draft.validate(&[], None).is_error());

    draft.occurrences = "  ".into();
    assert!(draft.validate(&[], None).is_error());
}

#[test]
fn empty_repeat_quantity_is_an_error_when_repeating() {
    let mut draft = ReminderDraft::new("Stand up");
    draft.kind = IntervalKind::Time;
    draft.repeating = true;
    draft.repeat_quantity = String::new();
    assert!(draft.validate(&[], None).is_error());

    draft.repeating = false;
    assert!(draft.validate(&[], None).is_success());
}

#[test]
fn duplicate_title_is_only_a_warning() {
    let existing = ReminderDraft::new("Stretch")
        .into_reminder(ReminderId::new(1))
        .unwrap();
    let draft = ReminderDraft::new("Stretch");

    match draft.validate(std::slice::from_ref(&existing), None) {
        ValidationOutcome::Warning(message) => assert!(message.contains("Stretch")),
        other => panic!("expected a warning, got {other:?}"),
    }
    assert!(draft
        .validate(std::slice::from_ref(&existing), Some(existing.id()))
        .is_success());
}

#[test]
fn duration_must_fit_inside_repeat_period() {
    let mut draft = ReminderDraft::new("Blink");
    draft.kind = IntervalKind::Time;
    draft.repeating = true;
    draft.repeat_quantity = "1".into();
    draft.repeat_unit = RepeatUnit::Minute;
    draft.earliest = at(10, 0, 0);

    draft.latest = draft.earliest + Duration::minutes(2);
    assert!(draft.validate(&[], None).is_error());

    draft.latest = draft.earliest + Duration::seconds(60);
    assert_eq!(draft.validate(&[], None), ValidationOutcome::Success);

    // Seconds are dropped before the comparison.
    draft.latest = draft.earliest + Duration::seconds(119);
    assert_eq!(draft.validate(&[], None), ValidationOutcome::Success);
}

#[test]
fn sub_minute_window_collapses_and_is_rejected() {
    let mut draft = ReminderDraft::new("Blink");
    draft.earliest = at(10, 0, 10);
    draft.latest = at(10, 0, 50);
    assert!(draft.validate(&[], None).is_error());

    draft.latest = at(10, 1, 5);
    assert_eq!(draft.validate(&[], None), ValidationOutcome::Success);
    let reminder = draft.into_reminder(ReminderId::new(1)).unwrap();
    assert_eq!(
        reminder.interval.latest() - reminder.interval.earliest(),
        Duration::minutes(1)
    );
}

// ============================================================================
// Minute truncation
// ============================================================================

#[test]
fn plain_reminder_bounds_are_whole_minutes() {
    let r = Reminder::builder(ReminderId::new(1))
        .title("plain")
        .date_interval(at(9, 15, 42), at(11, 3, 7))
        .total_occurrences(2)
        .build()
        .unwrap();
    assert_whole_minutes(&r.interval);
    assert_eq!(r.interval.earliest(), at(9, 15, 0));
}

#[test]
fn infinite_reminder_bounds_are_whole_minutes() {
    let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
    let r = Reminder::builder(ReminderId::new(2))
        .title("always")
        .infinite(day)
        .total_occurrences(5)
        .build()
        .unwrap();
    assert!(r.interval.is_infinite());
    assert_whole_minutes(&r.interval);
}

#[test]
fn time_only_reminder_bounds_are_whole_minutes() {
    let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
    let interval = TimeInterval::from_times(
        day,
        TimeOfDay::new(22, 30).unwrap(),
        TimeOfDay::new(1, 15).unwrap(),
        None,
    );
    let r = Reminder::builder(ReminderId::new(3))
        .title("night")
        .time_interval(interval)
        .total_occurrences(1)
        .build()
        .unwrap();
    assert_whole_minutes(&r.interval);
    assert!(r.interval.latest() > r.interval.earliest());

    let draft = ReminderDraft {
        kind: IntervalKind::Time,
        earliest: at(8, 0, 59),
        latest: at(9, 30, 1),
        ..ReminderDraft::new("drafted")
    };
    let r = draft.into_reminder(ReminderId::new(4)).unwrap();
    assert_whole_minutes(&r.interval);
}

#[test]
fn non_random_reminder_bounds_are_whole_minutes() {
    let r = Reminder::builder(ReminderId::new(5))
        .title("exact")
        .non_random(at(14, 7, 33))
        .build()
        .unwrap();
    assert_whole_minutes(&r.interval);
    assert_eq!(r.total_occurrences(), 1);
    assert_eq!(r.interval.latest() - r.interval.earliest(), Duration::minutes(1));
}
