//! Interfaces the scheduling engine consumes, plus the implementations used
//! outside a native shell.
//!
//! Every collaborator is stateless from the engine's point of view and may
//! be called from any task.

mod command;
mod console;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub use command::ShellCommandRunner;
pub use console::{ConsoleNotifier, SilentPlayer};

use crate::error::Result;
use crate::reminder::{Reminder, ReminderId};

/// Durable reminder storage. Failures are logged by the engine and never
/// stop it.
pub trait ReminderStore: Send + Sync {
    fn load(&self, id: ReminderId) -> Result<Option<Reminder>>;

    fn save(&self, reminder: &Reminder) -> Result<()>;

    fn delete(&self, id: ReminderId) -> Result<()>;

    fn load_all(&self) -> Result<Vec<Reminder>>;
}

/// Handle for a notification that was handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: ReminderId,
    pub title: String,
    pub subtitle: String,
    pub requested_at: DateTime<Local>,
}

/// OS notification delivery.
pub trait Notifier: Send + Sync {
    fn deliver(&self, title: &str, subtitle: &str, id: ReminderId) -> Result<NotificationRequest>;

    /// Whether the notification for `id` is currently on screen. Polled;
    /// a `false` after a `true` is taken as dismissal.
    fn is_delivered(&self, id: ReminderId) -> bool;

    /// Take a notification off screen. Default no-op.
    fn withdraw(&self, _id: ReminderId) {}
}

pub trait AudioPlayer: Send + Sync {
    fn play(&self, file: &str) -> Result<()>;

    fn stop(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "lowercase")]
pub enum CommandOutcome {
    Success,
    Error(String),
    Timeout(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub outcome: CommandOutcome,
}

impl CommandOutput {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            outcome: CommandOutcome::Error(message.into()),
        }
    }

    /// Text to show for this run: stdout on success, otherwise a
    /// description of what went wrong.
    pub fn display_text(&self) -> String {
        match &self.outcome {
            CommandOutcome::Success => self.stdout.trim().to_string(),
            CommandOutcome::Error(message) => format!("Command failed: {message}"),
            CommandOutcome::Timeout(secs) => format!("Command timed out after {secs}s"),
        }
    }
}

/// Runs shell commands. Blocking; never panics on command failure.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str, timeout: Duration) -> CommandOutput;
}

/// Global preferences the engine reads.
pub trait Preferences: Send + Sync {
    fn reminders_are_paused(&self) -> bool;
}

/// In-memory pause switch.
#[derive(Debug, Default)]
pub struct PausedFlag(AtomicBool);

impl PausedFlag {
    pub fn new(paused: bool) -> Self {
        Self(AtomicBool::new(paused))
    }

    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::SeqCst);
    }
}

impl Preferences for PausedFlag {
    fn reminders_are_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
