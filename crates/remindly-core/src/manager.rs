//! Owns the reminder collection and drives every reminder through its
//! lifecycle.
//!
//! A periodic sweep applies the tick rules to every reminder that is not
//! finished:
//!
//! 1. not started and inside its window → start an activator
//! 2. started and past its window → stop the activator gracefully
//! 3. not started, past its window, not repeating → finish
//! 4. not started, past its window, repeating → roll to the next cycle
//!
//! Activators never touch the collection. They report over a channel and
//! the dispatcher task applies their messages under the collection lock.
//! Lock order is collection → activators; the registry is only called
//! once the collection lock has been released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::activator::{
    activator_rng, can_activate, drive, Activator, ActivatorControl, ActivatorMessage,
    LoopContext,
};
use crate::collaborators::{Preferences, ReminderStore};
use crate::events::{Event, EventBus};
use crate::registry::ActiveReminderRegistry;
use crate::reminder::{Reminder, ReminderId};
use crate::storage::SchedulerConfig;

pub struct ReminderManager {
    reminders: Mutex<Vec<Reminder>>,
    /// One entry per live activator, from start until its loop reports
    /// completion or it is terminated.
    activators: Mutex<HashMap<ReminderId, ActivatorControl>>,
    registry: Arc<ActiveReminderRegistry>,
    store: Arc<dyn ReminderStore>,
    preferences: Arc<dyn Preferences>,
    events: EventBus,
    scheduler: SchedulerConfig,
    messages: mpsc::UnboundedSender<ActivatorMessage>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<ActivatorMessage>>>,
}

impl std::fmt::Debug for ReminderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderManager")
            .field("reminders", &self.lock_reminders().len())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl ReminderManager {
    pub fn new(
        registry: Arc<ActiveReminderRegistry>,
        store: Arc<dyn ReminderStore>,
        preferences: Arc<dyn Preferences>,
        events: EventBus,
        scheduler: SchedulerConfig,
    ) -> Self {
        let (messages, inbox) = mpsc::unbounded_channel();
        Self {
            reminders: Mutex::new(Vec::new()),
            activators: Mutex::new(HashMap::new()),
            registry,
            store,
            preferences,
            events,
            scheduler,
            messages,
            inbox: Mutex::new(Some(inbox)),
        }
    }

    fn lock_reminders(&self) -> MutexGuard<'_, Vec<Reminder>> {
        self.reminders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_activators(&self) -> MutexGuard<'_, HashMap<ReminderId, ActivatorControl>> {
        self.activators.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &Arc<ActiveReminderRegistry> {
        &self.registry
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn reminders(&self) -> Vec<Reminder> {
        let mut all = self.lock_reminders().clone();
        all.sort_by(Reminder::schedule_cmp);
        all
    }

    pub fn reminder(&self, id: ReminderId) -> Option<Reminder> {
        self.lock_reminders().iter().find(|r| r.id() == id).cloned()
    }

    pub fn reminder_ids(&self) -> Vec<ReminderId> {
        self.lock_reminders().iter().map(Reminder::id).collect()
    }

    /// Reminders that have not finished, by earliest start then id.
    pub fn upcoming_reminders(&self) -> Vec<Reminder> {
        let mut upcoming: Vec<_> = self
            .lock_reminders()
            .iter()
            .filter(|r| !r.is_finished())
            .cloned()
            .collect();
        upcoming.sort_by(Reminder::schedule_cmp);
        upcoming
    }

    pub fn past_reminders(&self) -> Vec<Reminder> {
        let mut past: Vec<_> = self
            .lock_reminders()
            .iter()
            .filter(|r| r.is_finished())
            .cloned()
            .collect();
        past.sort_by(Reminder::schedule_cmp);
        past
    }

    pub fn next_available_id(&self) -> ReminderId {
        ReminderId::next_available(self.lock_reminders().iter().map(|r| r.id().value()))
    }

    pub fn reminder_can_activate(&self, reminder: &Reminder) -> bool {
        can_activate(
            self.preferences.reminders_are_paused(),
            reminder.days,
            Local::now(),
        )
    }

    pub fn has_live_activator(&self, id: ReminderId) -> bool {
        self.lock_activators().contains_key(&id)
    }

    // ── Collection changes ───────────────────────────────────────────
    //
    // Everything below may spawn activator tasks and must run inside a
    // Tokio runtime.

    /// Populate the collection from the store. Reminders already managed
    /// are kept. Returns how many were added.
    pub fn load_from_store(&self) -> usize {
        let loaded = match self.store.load_all() {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(error = %e, "could not load reminders");
                return 0;
            }
        };

        let mut reminders = self.lock_reminders();
        let mut added = 0;
        for mut reminder in loaded {
            if reminders.iter().any(|r| r.id() == reminder.id()) {
                continue;
            }
            reminder.mark_interrupted();
            reminder.clamp_occurrences();
            reminders.push(reminder);
            added += 1;
        }
        if added > 0 {
            tracing::info!(added, "loaded reminders from store");
        }
        added
    }

    /// Add a reminder, persist it, and evaluate it right away.
    ///
    /// # Panics
    /// Panics if a reminder with the same id is already managed.
    pub fn add_reminder(&self, reminder: Reminder) {
        let now = Local::now();
        let id = reminder.id();
        let mut reminders = self.lock_reminders();
        assert!(
            !reminders.iter().any(|r| r.id() == id),
            "reminder {id} is already managed"
        );

        self.persist(&reminder);
        self.events.publish(Event::ReminderAdded {
            id,
            title: reminder.title.clone(),
        });
        reminders.push(reminder);
        if let Some(reminder) = reminders.last_mut() {
            self.apply_tick_rules(reminder, now);
        }
        tracing::info!(%id, "reminder added");
    }

    /// Replace a managed reminder with an edited version.
    ///
    /// # Panics
    /// Panics if no reminder with this id is managed.
    pub fn update_reminder(&self, reminder: Reminder) {
        let now = Local::now();
        let id = reminder.id();
        let mut reminders = self.lock_reminders();
        let Some(slot) = reminders.iter_mut().find(|r| r.id() == id) else {
            panic!("cannot update reminder {id}: not managed");
        };

        self.terminate_activator(id);
        *slot = reminder;
        self.persist(slot);
        self.events.publish(Event::ReminderUpdated { id });
        self.apply_tick_rules(slot, now);
    }

    /// Stop, deactivate and forget a reminder.
    ///
    /// # Panics
    /// Panics if no reminder with this id is managed.
    pub fn remove_reminder(&self, id: ReminderId) {
        {
            let mut reminders = self.lock_reminders();
            let Some(pos) = reminders.iter().position(|r| r.id() == id) else {
                panic!("cannot remove reminder {id}: not managed");
            };
            self.terminate_activator(id);
            reminders.remove(pos);
        }

        if self.registry.is_showing(id) {
            self.registry.deactivate_reminder(id);
        }
        self.registry.remove_waiting(id);

        if let Err(e) = self.store.delete(id) {
            tracing::warn!(%id, error = %e, "could not delete stored reminder");
        }
        self.events.publish(Event::ReminderRemoved { id });
        tracing::info!(%id, "reminder removed");
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Apply the tick rules to every reminder that has not finished.
    pub fn tick_at(&self, now: DateTime<Local>) {
        let mut reminders = self.lock_reminders();
        for reminder in reminders.iter_mut().filter(|r| !r.is_finished()) {
            self.apply_tick_rules(reminder, now);
        }
    }

    /// Start an activator for `id`. Logs and does nothing when one is
    /// already live or the id is unknown.
    pub fn start_reminder(&self, id: ReminderId) {
        let now = Local::now();
        let mut reminders = self.lock_reminders();
        match reminders.iter_mut().find(|r| r.id() == id) {
            Some(reminder) => self.start_locked(reminder, now),
            None => tracing::warn!(%id, "cannot start unknown reminder"),
        }
    }

    /// Stop the activator for `id`. A graceful stop lets the loop report
    /// completion, which resets the reminder; a permanent stop does not.
    pub fn stop_reminder(&self, id: ReminderId, permanent: bool) {
        let stopped = if permanent {
            self.terminate_activator(id)
        } else {
            match self.lock_activators().get(&id) {
                Some(control) => {
                    control.stop();
                    true
                }
                None => false,
            }
        };

        if stopped {
            tracing::debug!(%id, permanent, "activator stopped");
            self.events.publish(Event::ReminderStopped { id, permanent });
        } else {
            tracing::debug!(%id, "no live activator to stop");
        }
    }

    /// Handle natural completion: a repeating reminder moves to its next
    /// cycle with zeroed counts, anything else finishes.
    pub fn reset_reminder(&self, id: ReminderId) {
        let now = Local::now();
        let mut reminders = self.lock_reminders();
        match reminders.iter_mut().find(|r| r.id() == id) {
            Some(reminder) => self.reset_locked(reminder, now),
            None => tracing::debug!(%id, "reset of unknown reminder ignored"),
        }
    }

    fn apply_tick_rules(&self, reminder: &mut Reminder, now: DateTime<Local>) {
        if reminder.is_finished() {
            return;
        }
        let interval = reminder.interval;

        if reminder.is_started() {
            if interval.has_ended(now) {
                let running = self
                    .lock_activators()
                    .get(&reminder.id())
                    .map(ActivatorControl::is_running);
                if let Some(running) = running {
                    // A stopped activator still owes its completion report.
                    if running {
                        self.stop_reminder(reminder.id(), false);
                    }
                } else {
                    // Nothing left to report completion.
                    self.reset_locked(reminder, now);
                }
            }
            return;
        }

        if interval.contains(now) {
            self.start_locked(reminder, now);
        } else if interval.has_ended(now) {
            if interval.is_repeating() {
                self.roll_forward(reminder, now);
            } else {
                self.finish(reminder);
            }
        }
    }

    fn start_locked(&self, reminder: &mut Reminder, now: DateTime<Local>) {
        let id = reminder.id();
        let control = ActivatorControl::new();
        {
            let mut activators = self.lock_activators();
            if activators.contains_key(&id) {
                tracing::warn!(%id, "refusing to start: activator already live");
                return;
            }
            activators.insert(id, control.clone());
        }

        let tick_interval = self.scheduler.tick_interval();
        let activator = Activator::new(
            self.scheduler.strategy,
            reminder,
            now,
            tick_interval,
            activator_rng(self.scheduler.seed, id),
            control,
        );
        reminder.mark_started();
        self.persist(reminder);
        self.events.publish(Event::ReminderStarted { id, at: now });
        tracing::info!(%id, strategy = ?self.scheduler.strategy, "reminder started");

        tokio::spawn(drive(
            activator,
            LoopContext {
                id,
                days: reminder.days,
                preferences: Arc::clone(&self.preferences),
                tick_interval,
                messages: self.messages.clone(),
            },
        ));
    }

    fn reset_locked(&self, reminder: &mut Reminder, now: DateTime<Local>) {
        if reminder.interval.is_repeating() {
            self.roll_forward(reminder, now);
        } else {
            self.finish(reminder);
        }
    }

    fn roll_forward(&self, reminder: &mut Reminder, now: DateTime<Local>) {
        if !reminder.advance_to_next_cycle(now) {
            self.finish(reminder);
            return;
        }
        let id = reminder.id();
        self.persist(reminder);
        self.events.publish(Event::ReminderRescheduled {
            id,
            earliest: reminder.interval.earliest(),
            latest: reminder.interval.latest(),
        });
        tracing::debug!(%id, earliest = %reminder.interval.earliest(), "moved to next cycle");

        if reminder.interval.contains(now) {
            self.start_locked(reminder, now);
        }
    }

    fn finish(&self, reminder: &mut Reminder) {
        reminder.mark_finished();
        self.persist(reminder);
        self.events.publish(Event::ReminderFinished { id: reminder.id() });
        tracing::info!(id = %reminder.id(), "reminder finished");
    }

    /// Returns whether a live activator was terminated.
    fn terminate_activator(&self, id: ReminderId) -> bool {
        match self.lock_activators().remove(&id) {
            Some(control) => {
                control.terminate();
                true
            }
            None => false,
        }
    }

    fn persist(&self, reminder: &Reminder) {
        if let Err(e) = self.store.save(reminder) {
            tracing::warn!(id = %reminder.id(), error = %e, "could not save reminder");
        }
    }

    // ── Activator messages ───────────────────────────────────────────

    /// Apply one activator report.
    pub fn handle_message(&self, message: ActivatorMessage) {
        match message {
            ActivatorMessage::Activated { id, at, activation } => {
                let activated = {
                    let mut reminders = self.lock_reminders();
                    if !self.has_live_activator(id) {
                        tracing::debug!(%id, "activation from a retired activator ignored");
                        return;
                    }
                    let Some(reminder) = reminders.iter_mut().find(|r| r.id() == id) else {
                        return;
                    };
                    reminder.record_activation(at, activation.is_final);
                    self.persist(reminder);
                    reminder.clone()
                };

                tracing::info!(
                    %id,
                    count = activation.count,
                    is_final = activation.is_final,
                    "reminder activated"
                );
                self.events.publish(Event::ReminderActivated {
                    id,
                    count: activation.count,
                    is_final: activation.is_final,
                    at,
                });

                let registry = Arc::clone(&self.registry);
                tokio::spawn(async move { registry.activate_reminder(activated).await });
            }
            ActivatorMessage::Completed { id } => {
                // Retire and reset under one collection lock so a sweep
                // cannot see the reminder without its activator in between.
                let mut reminders = self.lock_reminders();
                if self.lock_activators().remove(&id).is_none() {
                    tracing::debug!(%id, "completion from a retired activator ignored");
                    return;
                }
                match reminders.iter_mut().find(|r| r.id() == id) {
                    Some(reminder) => self.reset_locked(reminder, Local::now()),
                    None => tracing::debug!(%id, "completion for unknown reminder ignored"),
                }
            }
        }
    }

    /// Reconcile stored reminders, then run the dispatcher and the
    /// periodic sweep until the returned handle is shut down.
    ///
    /// # Panics
    /// Panics if called more than once.
    pub fn start(self: &Arc<Self>) -> ManagerHandle {
        let Some(mut inbox) = self
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            panic!("reminder manager already started");
        };

        self.tick_at(Local::now());

        let (stop_tx, stop_rx) = watch::channel(false);

        let manager = Arc::clone(self);
        let mut stop = stop_rx.clone();
        let dispatcher = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = inbox.recv() => match message {
                        Some(message) => manager.handle_message(message),
                        None => break,
                    },
                    _ = stop.changed() => break,
                }
            }
            tracing::debug!("dispatcher stopped");
        });

        let manager = Arc::clone(self);
        let mut stop = stop_rx;
        let tick = self.scheduler.tick_interval();
        let periodic = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => manager.tick_at(Local::now()),
                    _ = stop.changed() => break,
                }
            }
            tracing::debug!("periodic sweep stopped");
        });

        tracing::info!(tick_ms = tick.as_millis() as u64, "reminder manager started");
        ManagerHandle {
            manager: Arc::clone(self),
            stop: stop_tx,
            tasks: vec![dispatcher, periodic],
        }
    }

    /// Permanently stop every live activator.
    pub fn shutdown(&self) {
        let controls: Vec<_> = self.lock_activators().drain().collect();
        for (id, control) in controls {
            control.terminate();
            tracing::debug!(%id, "activator terminated on shutdown");
        }
    }
}

/// Running engine. Dropping it leaves the tasks running; call
/// [`ManagerHandle::shutdown`] to stop them.
#[derive(Debug)]
pub struct ManagerHandle {
    manager: Arc<ReminderManager>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ManagerHandle {
    pub fn manager(&self) -> &Arc<ReminderManager> {
        &self.manager
    }

    /// Stop the sweep and the dispatcher, then terminate all activators.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "manager task ended abnormally");
            }
        }
        self.manager.shutdown();
        tracing::info!("reminder manager stopped");
    }
}
