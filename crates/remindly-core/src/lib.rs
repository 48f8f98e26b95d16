//! # Remindly Core Library
//!
//! Core logic for Remindly, a randomized reminder engine. A reminder fires a
//! configured number of times at random moments inside a time window; the
//! window may repeat on a fixed cadence. Everything here is usable from the
//! standalone CLI binary, with any GUI being a thin layer over the same
//! library.
//!
//! ## Architecture
//!
//! - **Schedule model**: date windows and repeating time-of-day windows
//! - **Activators**: per-reminder state machines deciding when to fire,
//!   either by a Bernoulli trial per tick or from pre-planned instants
//! - **Manager**: owns the collection and runs the periodic tick
//! - **Registry**: tracks notifications on screen and awaiting delivery
//! - **Storage**: JSON reminder files and TOML configuration
//!
//! ## Key Components
//!
//! - [`ReminderManager`]: lifecycle orchestration
//! - [`ActiveReminderRegistry`]: notification tracking
//! - [`ReminderDraft`]: user input validation
//! - [`Config`]: application configuration management
//! - [`ReminderContext`]: wires everything together

pub mod activator;
pub mod collaborators;
pub mod context;
pub mod error;
pub mod events;
pub mod manager;
pub mod registry;
pub mod reminder;
pub mod storage;

pub use activator::{Activation, ActivatorMessage, ActivatorStrategy};
pub use collaborators::{
    AudioPlayer, CommandOutcome, CommandOutput, CommandRunner, NotificationRequest, Notifier,
    Preferences, ReminderStore,
};
pub use context::{Collaborators, ReminderContext};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{Event, EventBus};
pub use manager::{ManagerHandle, ReminderManager};
pub use registry::{ActiveReminder, ActiveReminderRegistry};
pub use reminder::{
    ActivationEvents, ActivationHistory, DateInterval, DaySet, IntervalKind, Reminder,
    ReminderBuilder, ReminderDescription, ReminderDraft, ReminderId, ReminderInterval,
    ReminderState, Repeat, RepeatUnit, TimeInterval, TimeOfDay, ValidationOutcome,
};
pub use storage::{Config, JsonFileStore, MemoryStore};
