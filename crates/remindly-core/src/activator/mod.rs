//! Per-reminder activation timing.
//!
//! An activator is a small state machine in the same spirit as a wall-clock
//! timer: it has no thread of its own, the caller invokes `tick()` and gets
//! back an [`Activation`] when the reminder should fire. [`drive`] wraps
//! one in a Tokio loop and reports to the manager over a channel.
//!
//! ```text
//! running ──stop()──▶ stopped  (loop exits, completion reported)
//!    └────terminate()──▶ terminated (loop exits silently)
//! ```

mod scheduled;
mod ticked;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use scheduled::{plan_activations, ScheduledActivator};
pub use ticked::{activation_probability, TickedActivator};

use crate::collaborators::Preferences;
use crate::reminder::{weekday_of, DaySet, Reminder, ReminderId};

/// Which algorithm the manager uses for new activators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivatorStrategy {
    /// Bernoulli trial on every tick.
    #[default]
    Ticked,
    /// Pre-computed, evenly spaced instants with jitter.
    Scheduled,
}

impl std::str::FromStr for ActivatorStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticked" => Ok(ActivatorStrategy::Ticked),
            "scheduled" => Ok(ActivatorStrategy::Scheduled),
            other => Err(format!("unknown activator strategy '{other}'")),
        }
    }
}

/// One firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Activations so far in this cycle, including this one.
    pub count: u32,
    /// This was the last configured occurrence.
    pub is_final: bool,
}

/// The activation counted from `before` is the last one when `before`
/// has reached `total − 1`.
pub(crate) fn is_final_activation(before: u32, total: u32) -> bool {
    before >= total.saturating_sub(1)
}

#[derive(Debug)]
struct ControlFlags {
    running: AtomicBool,
    terminated: AtomicBool,
}

/// Shared stop flags between an activator loop and its owner.
#[derive(Debug, Clone)]
pub struct ActivatorControl {
    flags: Arc<ControlFlags>,
}

impl ActivatorControl {
    pub fn new() -> Self {
        Self {
            flags: Arc::new(ControlFlags {
                running: AtomicBool::new(true),
                terminated: AtomicBool::new(false),
            }),
        }
    }

    /// Graceful stop: the loop exits at its next iteration and reports
    /// completion.
    pub fn stop(&self) {
        self.flags.running.store(false, Ordering::SeqCst);
    }

    /// Permanent stop: no further ticks and no completion report.
    pub fn terminate(&self) {
        self.flags.terminated.store(true, Ordering::SeqCst);
        self.flags.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.flags.terminated.load(Ordering::SeqCst)
    }
}

impl Default for ActivatorControl {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum Activator {
    Ticked(TickedActivator),
    Scheduled(ScheduledActivator),
}

impl Activator {
    pub fn new(
        strategy: ActivatorStrategy,
        reminder: &Reminder,
        now: DateTime<Local>,
        tick_interval: Duration,
        mut rng: Mcg128Xsl64,
        control: ActivatorControl,
    ) -> Self {
        match strategy {
            ActivatorStrategy::Ticked => {
                Activator::Ticked(TickedActivator::new(reminder, tick_interval, rng, control))
            }
            ActivatorStrategy::Scheduled => Activator::Scheduled(ScheduledActivator::new(
                reminder, now, &mut rng, control,
            )),
        }
    }

    pub fn tick(&mut self, now: DateTime<Local>, can_activate: bool) -> Option<Activation> {
        match self {
            Activator::Ticked(a) => a.tick(can_activate),
            Activator::Scheduled(a) => a.tick(now, can_activate),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Activator::Ticked(a) => a.is_complete(),
            Activator::Scheduled(a) => a.is_complete(),
        }
    }

    pub fn control(&self) -> &ActivatorControl {
        match self {
            Activator::Ticked(a) => a.control(),
            Activator::Scheduled(a) => a.control(),
        }
    }
}

/// RNG for one activator. A configured seed is mixed with the reminder id
/// so reminders do not share a sequence.
pub fn activator_rng(seed: Option<u64>, id: ReminderId) -> Mcg128Xsl64 {
    match seed {
        Some(seed) => Mcg128Xsl64::seed_from_u64(seed ^ u64::from(id.value())),
        None => Mcg128Xsl64::from_entropy(),
    }
}

/// Whether a reminder restricted to `days` may fire at `now`.
pub fn can_activate(paused: bool, days: DaySet, now: DateTime<Local>) -> bool {
    !paused && days.contains(weekday_of(now))
}

/// What an activator loop tells the manager.
#[derive(Debug, Clone)]
pub enum ActivatorMessage {
    Activated {
        id: ReminderId,
        at: DateTime<Local>,
        activation: Activation,
    },
    /// The loop ended on its own or after a graceful stop.
    Completed { id: ReminderId },
}

/// Everything [`drive`] needs besides the activator itself.
pub(crate) struct LoopContext {
    pub id: ReminderId,
    pub days: DaySet,
    pub preferences: Arc<dyn Preferences>,
    pub tick_interval: Duration,
    pub messages: mpsc::UnboundedSender<ActivatorMessage>,
}

/// Activator loop. Sleeps one tick interval between evaluations.
pub(crate) async fn drive(mut activator: Activator, ctx: LoopContext) {
    let control = activator.control().clone();
    let mut interval = tokio::time::interval(ctx.tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if !control.is_running() {
            break;
        }

        let now = Local::now();
        let allowed = can_activate(ctx.preferences.reminders_are_paused(), ctx.days, now);
        if let Some(activation) = activator.tick(now, allowed) {
            let sent = ctx.messages.send(ActivatorMessage::Activated {
                id: ctx.id,
                at: now,
                activation,
            });
            if sent.is_err() {
                tracing::debug!(id = %ctx.id, "manager gone, activator exiting");
                return;
            }
        }
        if activator.is_complete() {
            break;
        }
    }

    if control.is_terminated() {
        tracing::debug!(id = %ctx.id, "activator terminated");
        return;
    }
    let _ = ctx.messages.send(ActivatorMessage::Completed { id: ctx.id });
}
