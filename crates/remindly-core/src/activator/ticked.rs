use rand::Rng;
use rand_pcg::Mcg128Xsl64;

use super::{is_final_activation, Activation, ActivatorControl};
use crate::reminder::Reminder;

/// Fires on independent per-tick Bernoulli trials.
///
/// With `p = total × tick / duration` the expected number of activations
/// over the window is `total`. This assumes the tick is short compared to
/// the window; very short windows are biased.
#[derive(Debug, Clone)]
pub struct TickedActivator {
    total_occurrences: u32,
    /// Seeded from the reminder once; the reminder's own count is updated
    /// elsewhere and is not read back.
    activations: u32,
    probability: f64,
    complete: bool,
    rng: Mcg128Xsl64,
    control: ActivatorControl,
}

impl TickedActivator {
    pub fn new(
        reminder: &Reminder,
        tick_interval: std::time::Duration,
        rng: Mcg128Xsl64,
        control: ActivatorControl,
    ) -> Self {
        let total = reminder.total_occurrences();
        let activations = reminder.occurrences();
        let probability = activation_probability(
            total,
            tick_interval.as_secs_f64(),
            reminder.interval.duration_seconds(),
        );
        Self {
            total_occurrences: total,
            activations,
            probability,
            complete: activations >= total,
            rng,
            control,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn control(&self) -> &ActivatorControl {
        &self.control
    }

    pub fn tick(&mut self, can_activate: bool) -> Option<Activation> {
        if self.complete || self.control.is_terminated() || !can_activate {
            return None;
        }
        if self.rng.gen::<f64>() >= self.probability {
            return None;
        }

        let is_final = is_final_activation(self.activations, self.total_occurrences);
        self.activations += 1;
        if is_final {
            self.complete = true;
        }
        Some(Activation {
            count: self.activations,
            is_final,
        })
    }
}

/// Per-tick activation probability. A zero-length window never reaches
/// here after validation; it yields an infinite probability, i.e. every
/// tick fires.
pub fn activation_probability(total: u32, tick_secs: f64, duration_secs: f64) -> f64 {
    f64::from(total) * tick_secs / duration_secs
}
