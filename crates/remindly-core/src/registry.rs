//! Which reminders are currently on screen.
//!
//! Each activation delivers one notification. The registry keeps the most
//! recent one per reminder, and tracks a separate waiting set for
//! notifications handed to the OS whose delivery has not been confirmed yet.
//!
//! Dismissal is detected by polling [`Notifier::is_delivered`]: once a
//! delivered notification stops being reported, it is deactivated.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::collaborators::{
    AudioPlayer, CommandOutcome, CommandRunner, NotificationRequest, Notifier,
};
use crate::events::{Event, EventBus};
use crate::reminder::{Reminder, ReminderDescription, ReminderId};
use crate::storage::{CommandsConfig, NotificationsConfig};

/// A reminder whose notification is showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveReminder {
    pub id: ReminderId,
    pub title: String,
    pub subtitle: String,
    pub activated_at: DateTime<Local>,
    pub request: NotificationRequest,
    /// Keep tracking until dismissed rather than releasing on delivery.
    pub show_when_active: bool,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    delivery_poll: Duration,
    delivery_timeout: Duration,
    dismissal_poll: Duration,
    command_timeout: Duration,
}

pub struct ActiveReminderRegistry {
    active: Mutex<HashMap<ReminderId, ActiveReminder>>,
    waiting: Mutex<HashSet<ReminderId>>,
    notifier: Arc<dyn Notifier>,
    audio: Arc<dyn AudioPlayer>,
    commands: Arc<dyn CommandRunner>,
    events: EventBus,
    timing: Timing,
    next_generation: Mutex<u64>,
}

impl std::fmt::Debug for ActiveReminderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveReminderRegistry")
            .field("showing", &self.showing_ids())
            .field("waiting", &self.waiting_ids())
            .finish_non_exhaustive()
    }
}

impl ActiveReminderRegistry {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioPlayer>,
        commands: Arc<dyn CommandRunner>,
        events: EventBus,
        notifications: &NotificationsConfig,
        command_config: &CommandsConfig,
    ) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            waiting: Mutex::new(HashSet::new()),
            notifier,
            audio,
            commands,
            events,
            timing: Timing {
                delivery_poll: notifications.delivery_poll(),
                delivery_timeout: notifications.delivery_timeout(),
                dismissal_poll: notifications.dismissal_poll(),
                command_timeout: command_config.timeout(),
            },
            next_generation: Mutex::new(0),
        }
    }

    // ── Waiting set ──────────────────────────────────────────────────

    pub fn mark_as_waiting(&self, id: ReminderId) {
        let inserted = self
            .waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        if inserted {
            self.events.publish(Event::WaitingChanged { id, waiting: true });
        }
    }

    pub fn remove_waiting(&self, id: ReminderId) {
        let removed = self
            .waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed {
            self.events.publish(Event::WaitingChanged { id, waiting: false });
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn showing_ids(&self) -> Vec<ReminderId> {
        let mut ids: Vec<_> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn waiting_ids(&self) -> Vec<ReminderId> {
        let mut ids: Vec<_> = self
            .waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn is_showing(&self, id: ReminderId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn is_waiting(&self, id: ReminderId) -> bool {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    pub fn active(&self, id: ReminderId) -> Option<ActiveReminder> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    // ── Activation ───────────────────────────────────────────────────

    /// Show `reminder`: resolve its subtitle, deliver (or re-deliver) the
    /// notification, play its sound and fire its command hook, then watch
    /// the notification until it is dismissed.
    pub async fn activate_reminder(self: &Arc<Self>, reminder: Reminder) {
        let id = reminder.id();
        let subtitle = self.resolve_subtitle(&reminder.description).await;

        if let Some(command) = reminder.events.command.clone() {
            self.spawn_command_hook(id, command);
        }

        let request = match self.notifier.deliver(&reminder.title, &subtitle, id) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(%id, error = %e, "notification delivery failed");
                return;
            }
        };

        let generation = self.bump_generation();
        let redelivered = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = active.insert(
                id,
                ActiveReminder {
                    id,
                    title: reminder.title.clone(),
                    subtitle: subtitle.clone(),
                    activated_at: request.requested_at,
                    request,
                    show_when_active: reminder.events.show_when_active,
                    generation,
                },
            );
            previous.is_some()
        };
        if redelivered {
            tracing::debug!(%id, "re-delivered through existing notification");
        }

        self.mark_as_waiting(id);
        self.events.publish(Event::ReminderShown {
            id,
            title: reminder.title.clone(),
            subtitle,
        });

        if let Some(sound) = reminder.events.sound.as_deref() {
            if let Err(e) = self.audio.play(sound) {
                tracing::warn!(%id, error = %e, "could not play sound");
            }
        }

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.watch(id, generation).await });
    }

    /// Take `id` off screen. A missing id is logged and otherwise ignored.
    pub fn deactivate_reminder(&self, id: ReminderId) {
        let removed = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.remove_waiting(id);

        if removed.is_none() {
            tracing::warn!(%id, "deactivating a reminder that is not active");
            return;
        }
        self.audio.stop();
        self.notifier.withdraw(id);
        self.events.publish(Event::ReminderDismissed { id });
        tracing::info!(%id, "reminder deactivated");
    }

    async fn resolve_subtitle(&self, description: &ReminderDescription) -> String {
        match description {
            ReminderDescription::Text(text) => text.clone(),
            ReminderDescription::Command(command) => {
                let runner = Arc::clone(&self.commands);
                let command = command.clone();
                let timeout = self.timing.command_timeout;
                match tokio::task::spawn_blocking(move || runner.run(&command, timeout)).await {
                    Ok(output) => output.display_text(),
                    Err(e) => format!("Command failed: {e}"),
                }
            }
        }
    }

    fn spawn_command_hook(&self, id: ReminderId, command: String) {
        let runner = Arc::clone(&self.commands);
        let timeout = self.timing.command_timeout;
        tokio::task::spawn_blocking(move || {
            let output = runner.run(&command, timeout);
            if output.outcome != CommandOutcome::Success {
                tracing::warn!(%id, outcome = ?output.outcome, "activation command failed");
            } else {
                tracing::debug!(%id, "activation command finished");
            }
        });
    }

    fn bump_generation(&self) -> u64 {
        let mut next = self
            .next_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        *next
    }

    /// Whether the entry for `id` still belongs to the delivery that
    /// started this watch.
    fn is_current(&self, id: ReminderId, generation: u64) -> Option<bool> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|a| a.generation == generation)
    }

    /// Remove the entry without withdrawing the notification.
    fn release(&self, id: ReminderId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        tracing::debug!(%id, "released after delivery");
    }

    async fn watch(&self, id: ReminderId, generation: u64) {
        let deadline = Instant::now() + self.timing.delivery_timeout;
        loop {
            if self.is_current(id, generation) != Some(true) {
                return;
            }
            if self.notifier.is_delivered(id) {
                break;
            }
            if Instant::now() >= deadline {
                tracing::warn!(%id, "delivery not confirmed before timeout");
                self.deactivate_reminder(id);
                return;
            }
            tokio::time::sleep(self.timing.delivery_poll).await;
        }
        self.remove_waiting(id);

        let show_when_active = self
            .active(id)
            .map(|a| a.show_when_active)
            .unwrap_or(false);
        if !show_when_active {
            self.release(id);
            return;
        }

        loop {
            tokio::time::sleep(self.timing.dismissal_poll).await;
            match self.is_current(id, generation) {
                Some(true) => {}
                // Re-delivered or already deactivated; nothing left to watch.
                _ => return,
            }
            if !self.notifier.is_delivered(id) {
                tracing::debug!(%id, "notification dismissed");
                self.deactivate_reminder(id);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CommandOutput;
    use crate::error::Result;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeNotifier {
        delivered: AtomicUsize,
        on_screen: AtomicBool,
        last_subtitle: Mutex<String>,
    }

    impl Notifier for FakeNotifier {
        fn deliver(&self, title: &str, subtitle: &str, id: ReminderId) -> Result<NotificationRequest> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            self.on_screen.store(true, Ordering::SeqCst);
            *self.last_subtitle.lock().unwrap() = subtitle.to_string();
            Ok(NotificationRequest {
                id,
                title: title.into(),
                subtitle: subtitle.into(),
                requested_at: Local::now(),
            })
        }

        fn is_delivered(&self, _id: ReminderId) -> bool {
            self.on_screen.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct FakeAudio {
        played: AtomicUsize,
        stopped: AtomicUsize,
    }

    impl AudioPlayer for FakeAudio {
        fn play(&self, _file: &str) -> Result<()> {
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct EchoRunner;

    impl CommandRunner for EchoRunner {
        fn run(&self, command: &str, _timeout: Duration) -> CommandOutput {
            if command == "fail" {
                CommandOutput::failed("boom")
            } else {
                CommandOutput {
                    stdout: format!("{command}\n"),
                    stderr: String::new(),
                    outcome: CommandOutcome::Success,
                }
            }
        }
    }

    fn registry(
        notifier: Arc<FakeNotifier>,
        audio: Arc<FakeAudio>,
    ) -> Arc<ActiveReminderRegistry> {
        Arc::new(ActiveReminderRegistry::new(
            notifier,
            audio,
            Arc::new(EchoRunner),
            EventBus::new(),
            &NotificationsConfig::default(),
            &CommandsConfig::default(),
        ))
    }

    fn reminder(value: u32, description: ReminderDescription, show: bool) -> Reminder {
        let now = Local::now();
        Reminder::builder(ReminderId::new(value))
            .title("Water")
            .description(description)
            .date_interval(now, now + ChronoDuration::hours(1))
            .total_occurrences(1)
            .events(crate::reminder::ActivationEvents {
                sound: Some("ding.wav".into()),
                show_when_active: show,
                command: None,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn waiting_set_is_idempotent_and_publishes_once() {
        let reg = registry(Arc::default(), Arc::default());
        let mut rx = reg.events.subscribe();
        let id = ReminderId::new(1);

        reg.mark_as_waiting(id);
        reg.mark_as_waiting(id);
        assert_eq!(reg.waiting_ids(), vec![id]);
        reg.remove_waiting(id);
        reg.remove_waiting(id);
        assert!(reg.waiting_ids().is_empty());

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::WaitingChanged { id, waiting: true }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::WaitingChanged { id, waiting: false }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn deactivating_unknown_id_is_harmless() {
        let audio = Arc::new(FakeAudio::default());
        let reg = registry(Arc::default(), Arc::clone(&audio));
        reg.deactivate_reminder(ReminderId::new(42));
        assert_eq!(audio.stopped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_shows_then_dismissal_deactivates() {
        let notifier = Arc::new(FakeNotifier::default());
        let audio = Arc::new(FakeAudio::default());
        let reg = registry(Arc::clone(&notifier), Arc::clone(&audio));
        let r = reminder(3, ReminderDescription::Text("drink".into()), true);
        let id = r.id();

        reg.activate_reminder(r).await;
        assert!(reg.is_showing(id));
        assert_eq!(reg.active(id).unwrap().subtitle, "drink");
        assert_eq!(audio.played.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!reg.is_waiting(id), "delivery confirmed");
        assert!(reg.is_showing(id));

        notifier.on_screen.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!reg.is_showing(id));
        assert_eq!(audio.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivery_reuses_the_entry() {
        let notifier = Arc::new(FakeNotifier::default());
        let reg = registry(Arc::clone(&notifier), Arc::default());
        let r = reminder(5, ReminderDescription::Text(String::new()), true);
        let id = r.id();

        reg.activate_reminder(r.clone()).await;
        reg.activate_reminder(r).await;
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 2);
        assert_eq!(reg.showing_ids(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn command_description_degrades_to_error_text() {
        let notifier = Arc::new(FakeNotifier::default());
        let reg = registry(Arc::clone(&notifier), Arc::default());

        reg.activate_reminder(reminder(6, ReminderDescription::Command("fail".into()), true))
            .await;
        assert_eq!(*notifier.last_subtitle.lock().unwrap(), "Command failed: boom");

        reg.activate_reminder(reminder(7, ReminderDescription::Command("hi".into()), true))
            .await;
        assert_eq!(*notifier.last_subtitle.lock().unwrap(), "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn reminders_not_shown_while_active_are_released_on_delivery() {
        let notifier = Arc::new(FakeNotifier::default());
        let reg = registry(Arc::clone(&notifier), Arc::default());
        let r = reminder(8, ReminderDescription::default(), false);
        let id = r.id();

        reg.activate_reminder(r).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!reg.is_showing(id));
        assert!(!reg.is_waiting(id));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_delivery_times_out() {
        let notifier = Arc::new(FakeNotifier::default());
        let reg = registry(Arc::clone(&notifier), Arc::default());
        let r = reminder(9, ReminderDescription::default(), true);
        let id = r.id();

        reg.activate_reminder(r).await;
        notifier.on_screen.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!reg.is_showing(id));
        assert!(!reg.is_waiting(id));
    }
}
