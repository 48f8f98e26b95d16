use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::reminder::ReminderId;

const CHANNEL_CAPACITY: usize = 1024;

/// Every state change in the engine produces an Event.
/// UIs subscribe to them and refresh; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReminderAdded {
        id: ReminderId,
        title: String,
    },
    ReminderUpdated {
        id: ReminderId,
    },
    ReminderRemoved {
        id: ReminderId,
    },
    ReminderStarted {
        id: ReminderId,
        at: DateTime<Local>,
    },
    ReminderStopped {
        id: ReminderId,
        permanent: bool,
    },
    ReminderActivated {
        id: ReminderId,
        count: u32,
        is_final: bool,
        at: DateTime<Local>,
    },
    /// A repeating reminder moved to its next window.
    ReminderRescheduled {
        id: ReminderId,
        earliest: DateTime<Local>,
        latest: DateTime<Local>,
    },
    ReminderFinished {
        id: ReminderId,
    },
    /// The set of reminders waiting for delivery confirmation changed.
    WaitingChanged {
        id: ReminderId,
        waiting: bool,
    },
    ReminderShown {
        id: ReminderId,
        title: String,
        subtitle: String,
    },
    ReminderDismissed {
        id: ReminderId,
    },
}

impl Event {
    pub fn reminder_id(&self) -> ReminderId {
        match self {
            Event::ReminderAdded { id, .. }
            | Event::ReminderUpdated { id }
            | Event::ReminderRemoved { id }
            | Event::ReminderStarted { id, .. }
            | Event::ReminderStopped { id, .. }
            | Event::ReminderActivated { id, .. }
            | Event::ReminderRescheduled { id, .. }
            | Event::ReminderFinished { id }
            | Event::WaitingChanged { id, .. }
            | Event::ReminderShown { id, .. }
            | Event::ReminderDismissed { id } => *id,
        }
    }
}

/// Fan-out of [`Event`]s. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, event: Event) {
        tracing::trace!(?event, "publish");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
