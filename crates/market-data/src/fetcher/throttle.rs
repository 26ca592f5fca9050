use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::warn;
use tokio::time::Instant;

/// Default window during which a given error class is logged once.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limits log lines per error class.
///
/// During a sustained outage every request degrades the same way; only the
/// first occurrence of each class per window is worth a log entry.
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    last_logged: Mutex<HashMap<&'static str, Instant>>,
}

impl LogThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if `class` has not been logged within the window, and
    /// marks it as logged now.
    pub fn should_log(&self, class: &'static str) -> bool {
        let now = Instant::now();
        let mut last_logged = self.lock();

        match last_logged.get(class) {
            Some(at) if now.duration_since(*at) < self.window => false,
            _ => {
                last_logged.insert(class, now);
                true
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Instant>> {
        self.last_logged.lock().unwrap_or_else(|poisoned| {
            warn!("Log throttle mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_logs_once_per_class_per_window() {
        let throttle = LogThrottle::default();

        assert!(throttle.should_log("provider.timeout"));
        assert!(!throttle.should_log("provider.timeout"));
        assert!(throttle.should_log("provider.upstream"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!throttle.should_log("provider.timeout"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(throttle.should_log("provider.timeout"));
        assert!(!throttle.should_log("provider.timeout"));
    }
}
