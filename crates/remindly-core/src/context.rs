//! Explicit wiring of the engine.
//!
//! A [`ReminderContext`] is built once at startup and handed to whoever
//! needs the manager or the registry.

use std::sync::Arc;

use crate::collaborators::{
    AudioPlayer, CommandRunner, ConsoleNotifier, Notifier, PausedFlag, Preferences,
    ReminderStore, ShellCommandRunner, SilentPlayer,
};
use crate::error::Result;
use crate::events::EventBus;
use crate::manager::ReminderManager;
use crate::registry::ActiveReminderRegistry;
use crate::storage::{Config, JsonFileStore, MemoryStore};

/// The outside world as the engine sees it.
pub struct Collaborators {
    pub store: Arc<dyn ReminderStore>,
    pub notifier: Arc<dyn Notifier>,
    pub audio: Arc<dyn AudioPlayer>,
    pub commands: Arc<dyn CommandRunner>,
}

impl Collaborators {
    /// File-backed store, console notifications, shell commands, no sound.
    pub fn console(config: &Config) -> Result<Self> {
        Ok(Self {
            store: Arc::new(JsonFileStore::open_default()?),
            notifier: Arc::new(ConsoleNotifier::new(config.notifications.display_time())),
            audio: Arc::new(SilentPlayer),
            commands: Arc::new(ShellCommandRunner::new()),
        })
    }

    /// Like [`Collaborators::console`] but nothing is persisted.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(ConsoleNotifier::new(config.notifications.display_time())),
            audio: Arc::new(SilentPlayer),
            commands: Arc::new(ShellCommandRunner::new()),
        }
    }
}

pub struct ReminderContext {
    config: Config,
    events: EventBus,
    paused: Arc<PausedFlag>,
    registry: Arc<ActiveReminderRegistry>,
    manager: Arc<ReminderManager>,
}

impl ReminderContext {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let events = EventBus::new();
        let paused = Arc::new(PausedFlag::new(config.reminders_paused));
        let registry = Arc::new(ActiveReminderRegistry::new(
            collaborators.notifier,
            collaborators.audio,
            collaborators.commands,
            events.clone(),
            &config.notifications,
            &config.commands,
        ));
        let preferences: Arc<dyn Preferences> = Arc::clone(&paused) as Arc<dyn Preferences>;
        let manager = Arc::new(ReminderManager::new(
            Arc::clone(&registry),
            collaborators.store,
            preferences,
            events.clone(),
            config.scheduler.clone(),
        ));

        tracing::debug!(
            strategy = ?config.scheduler.strategy,
            paused = config.reminders_paused,
            "reminder context created"
        );
        Self {
            config,
            events,
            paused,
            registry,
            manager,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn manager(&self) -> &Arc<ReminderManager> {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<ActiveReminderRegistry> {
        &self.registry
    }

    /// Pause or resume every reminder. Takes effect on the next tick.
    pub fn set_paused(&self, paused: bool) {
        self.paused.set(paused);
        tracing::info!(paused, "reminders pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.reminders_are_paused()
    }
}
