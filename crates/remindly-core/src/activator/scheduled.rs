use std::collections::VecDeque;

use chrono::{DateTime, Duration, Local};
use rand::Rng;
use rand_pcg::Mcg128Xsl64;

use super::{is_final_activation, Activation, ActivatorControl};
use crate::reminder::Reminder;

/// Fires at instants planned up front: the remaining window is split into
/// one equal slot per remaining occurrence, with a random instant in each.
#[derive(Debug, Clone)]
pub struct ScheduledActivator {
    total_occurrences: u32,
    activations: u32,
    queue: VecDeque<DateTime<Local>>,
    complete: bool,
    control: ActivatorControl,
}

impl ScheduledActivator {
    pub fn new(
        reminder: &Reminder,
        now: DateTime<Local>,
        rng: &mut Mcg128Xsl64,
        control: ActivatorControl,
    ) -> Self {
        let start = reminder.interval.earliest().max(now);
        let end = reminder.interval.latest();
        let queue = plan_activations(start, end, reminder.occurrences_left(), rng);
        Self {
            total_occurrences: reminder.total_occurrences(),
            activations: reminder.occurrences(),
            complete: queue.is_empty(),
            queue: queue.into(),
            control,
        }
    }

    /// Planned instants not yet fired, in order.
    pub fn pending(&self) -> impl Iterator<Item = &DateTime<Local>> {
        self.queue.iter()
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

    /// Fire the head of the queue once it is due. A due instant that comes
    /// up while the reminder cannot activate is dropped.
    pub fn tick(&mut self, now: DateTime<Local>, can_activate: bool) -> Option<Activation> {
        if self.complete || self.control.is_terminated() {
            return None;
        }

        while let Some(&head) = self.queue.front() {
            if head > now {
                break;
            }
            self.queue.pop_front();
            if !can_activate {
                tracing::debug!(at = %head, "dropping planned activation while blocked");
                continue;
            }

            let is_final = is_final_activation(self.activations, self.total_occurrences);
            self.activations += 1;
            if is_final || self.queue.is_empty() {
                self.complete = true;
            }
            return Some(Activation {
                count: self.activations,
                is_final,
            });
        }

        if self.queue.is_empty() {
            self.complete = true;
        }
        None
    }
}

/// Split `[start, end)` into `count` equal slots and pick one instant
/// uniformly inside each. Returned in ascending order.
pub fn plan_activations(
    start: DateTime<Local>,
    end: DateTime<Local>,
    count: u32,
    rng: &mut Mcg128Xsl64,
) -> Vec<DateTime<Local>> {
    if count == 0 {
        return Vec::new();
    }
    let span_ms = (end - start).num_milliseconds().max(0);
    let slot_ms = span_ms / i64::from(count);

    (0..i64::from(count))
        .map(|i| {
            let slot_start = start + Duration::milliseconds(slot_ms * i);
            let offset = if slot_ms > 0 {
                rng.gen_range(0..slot_ms)
            } else {
                0
            };
            slot_start + Duration::milliseconds(offset)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::ReminderId;
    use rand::SeedableRng;

    fn reminder(start: DateTime<Local>, minutes: i64, total: u32) -> Reminder {
        Reminder::builder(ReminderId::new(1))
            .title("Review")
            .date_interval(start, start + Duration::minutes(minutes))
            .total_occurrences(total)
            .build()
            .unwrap()
    }

    #[test]
    fn plan_places_one_instant_per_slot() {
        let mut rng = Mcg128Xsl64::seed_from_u64(42);
        let start = Local::now();
        let end = start + Duration::hours(4);
        let plan = plan_activations(start, end, 4, &mut rng);
        assert_eq!(plan.len(), 4);
        for (i, at) in plan.iter().enumerate() {
            let slot_start = start + Duration::hours(i as i64);
            let slot_end = slot_start + Duration::hours(1);
            assert!(*at >= slot_start && *at < slot_end, "slot {i} out of range");
        }
    }

    #[test]
    fn starts_from_now_when_window_already_began() {
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        let now = Local::now();
        let r = reminder(now - Duration::hours(1), 120, 3);
        let a = ScheduledActivator::new(&r, now, &mut rng, ActivatorControl::new());
        assert_eq!(a.pending().count(), 3);
        assert!(a.pending().all(|at| *at >= now));
    }

    #[test]
    fn fires_all_planned_instants_and_completes() {
        let mut rng = Mcg128Xsl64::seed_from_u64(3);
        let now = Local::now();
        let r = reminder(now, 30, 3);
        let mut a = ScheduledActivator::new(&r, now, &mut rng, ActivatorControl::new());

        let later = now + Duration::hours(1);
        let fired: Vec<_> = (0..5).filter_map(|_| a.tick(later, true)).collect();
        assert_eq!(fired.len(), 3);
        assert!(fired[2].is_final);
        assert!(!fired[0].is_final);
        assert!(a.is_complete());
    }

    #[test]
    fn nothing_due_yet() {
        let mut rng = Mcg128Xsl64::seed_from_u64(3);
        let now = Local::now();
        let r = reminder(now + Duration::hours(1), 30, 2);
        let mut a = ScheduledActivator::new(&r, now, &mut rng, ActivatorControl::new());
        assert!(a.tick(now, true).is_none());
        assert!(!a.is_complete());
    }

    #[test]
    fn blocked_instants_are_dropped() {
        let mut rng = Mcg128Xsl64::seed_from_u64(3);
        let now = Local::now();
        let r = reminder(now, 30, 2);
        let mut a = ScheduledActivator::new(&r, now, &mut rng, ActivatorControl::new());
        assert!(a.tick(now + Duration::hours(1), false).is_none());
        assert!(a.is_complete());
        assert_eq!(a.activations(), 0);
    }

    #[test]
    fn terminated_activator_is_inert() {
        let mut rng = Mcg128Xsl64::seed_from_u64(3);
        let now = Local::now();
        let r = reminder(now, 30, 2);
        let mut a = ScheduledActivator::new(&r, now, &mut rng, ActivatorControl::new());
        a.control().terminate();
        assert!(a.tick(now + Duration::hours(1), true).is_none());
        assert_eq!(a.pending().count(), 2);
    }
}
