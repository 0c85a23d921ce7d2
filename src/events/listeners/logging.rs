use async_trait::async_trait;

use crate::events::{Listener, SecurityEvent};

/// Logs security events using the `log` crate.
///
/// Alerts (rate limiting, suspicious location, denial) are logged at WARN
/// regardless of the configured level.
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    /// Creates a new logging listener at INFO level.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }

    fn level_for(&self, event: &SecurityEvent) -> log::Level {
        if event.is_alert() {
            self.level.min(log::Level::Warn)
        } else {
            self.level
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &SecurityEvent) {
        log::log!(
            target: "login_shield::events",
            self.level_for(event),
            "event={} {:?}",
            event.name(),
            event
        );
    }
}
