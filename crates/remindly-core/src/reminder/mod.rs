mod draft;
mod entity;
mod id;
mod interval;

pub use draft::{IntervalKind, ReminderDraft, ValidationOutcome};
pub use entity::{
    ActivationEvents, ActivationHistory, DaySet, Reminder, ReminderBuilder, ReminderDescription,
    ReminderState,
};
pub(crate) use entity::weekday_of;
pub use id::ReminderId;
pub use interval::{
    truncate_to_minute, DateInterval, ReminderInterval, Repeat, RepeatUnit, TimeInterval,
    TimeOfDay,
};
