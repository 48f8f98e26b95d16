use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reminder identity.
///
/// Numeric values are reused once a reminder is deleted, so the creation
/// timestamp is part of the identity: two ids with the same value but
/// different creation times are different reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderId {
    value: u32,
    created: DateTime<Utc>,
}

impl ReminderId {
    /// Value reserved for the quick reminder.
    pub const QUICK_VALUE: u32 = 0;

    pub fn new(value: u32) -> Self {
        Self::with_created(value, Utc::now())
    }

    pub fn with_created(value: u32, created: DateTime<Utc>) -> Self {
        Self { value, created }
    }

    /// Id of the singleton quick reminder.
    pub fn quick() -> Self {
        Self::new(Self::QUICK_VALUE)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn is_quick(&self) -> bool {
        self.value == Self::QUICK_VALUE
    }

    /// Smallest value ≥ 1 not present in `used`.
    pub fn next_available<I>(used: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        let mut taken: Vec<u32> = used.into_iter().filter(|v| *v > 0).collect();
        taken.sort_unstable();
        taken.dedup();

        let mut candidate = 1;
        for value in taken {
            if value != candidate {
                break;
            }
            candidate += 1;
        }
        Self::new(candidate)
    }
}

impl Ord for ReminderId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.created.cmp(&other.created))
    }
}

impl PartialOrd for ReminderId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn reused_value_with_new_creation_time_is_distinct() {
        let created = Utc::now();
        let old = ReminderId::with_created(4, created);
        let new = ReminderId::with_created(4, created + Duration::seconds(1));
        assert_eq!(old.value(), new.value());
        assert_ne!(old, new);
    }

    #[test]
    fn ordered_by_value_first() {
        let created = Utc::now();
        let a = ReminderId::with_created(2, created + Duration::days(1));
        let b = ReminderId::with_created(3, created);
        assert!(a < b);
    }

    #[test]
    fn next_available_skips_quick_and_fills_gaps() {
        assert_eq!(ReminderId::next_available(Vec::new()).value(), 1);
        assert_eq!(ReminderId::next_available(vec![0, 1, 2]).value(), 3);
        assert_eq!(ReminderId::next_available(vec![1, 3, 4]).value(), 2);
        assert_eq!(ReminderId::next_available(vec![2, 2, 3]).value(), 1);
    }

    #[test]
    fn quick_id_is_zero() {
        assert!(ReminderId::quick().is_quick());
        assert_eq!(ReminderId::quick().value(), 0);
    }
}
