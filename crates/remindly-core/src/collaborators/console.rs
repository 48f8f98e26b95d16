use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Local;

use super::{AudioPlayer, NotificationRequest, Notifier};
use crate::error::Result;
use crate::reminder::ReminderId;

/// Prints notifications to stderr and treats each one as on screen for
/// `display_for`, after which it counts as dismissed.
#[derive(Debug)]
pub struct ConsoleNotifier {
    display_for: Duration,
    shown: Mutex<HashMap<ReminderId, Instant>>,
}

impl ConsoleNotifier {
    pub fn new(display_for: Duration) -> Self {
        Self {
            display_for,
            shown: Mutex::new(HashMap::new()),
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn deliver(&self, title: &str, subtitle: &str, id: ReminderId) -> Result<NotificationRequest> {
        if subtitle.is_empty() {
            eprintln!("🔔 {title}");
        } else {
            eprintln!("🔔 {title}: {subtitle}");
        }
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Instant::now());
        Ok(NotificationRequest {
            id,
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            requested_at: Local::now(),
        })
    }

    fn is_delivered(&self, id: ReminderId) -> bool {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        match shown.get(&id) {
            Some(at) if at.elapsed() < self.display_for => true,
            Some(_) => {
                shown.remove(&id);
                false
            }
            None => false,
        }
    }

    fn withdraw(&self, id: ReminderId) {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Audio player for environments without sound output; only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn play(&self, file: &str) -> Result<()> {
        tracing::info!(file, "would play sound");
        Ok(())
    }

    fn stop(&self) {
        tracing::debug!("would stop sound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_expires_after_display_time() {
        let notifier = ConsoleNotifier::new(Duration::from_millis(30));
        let id = ReminderId::new(1);
        assert!(!notifier.is_delivered(id));
        notifier.deliver("Title", "", id).unwrap();
        assert!(notifier.is_delivered(id));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!notifier.is_delivered(id));
    }

    #[test]
    fn withdraw_removes_notification() {
        let notifier = ConsoleNotifier::new(Duration::from_secs(60));
        let id = ReminderId::new(2);
        notifier.deliver("Title", "sub", id).unwrap();
        notifier.withdraw(id);
        assert!(!notifier.is_delivered(id));
    }
}
