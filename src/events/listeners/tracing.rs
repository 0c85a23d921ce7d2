use async_trait::async_trait;

use crate::events::{Listener, SecurityEvent};

/// Emits security events as tracing events.
///
/// Requires the `tracing` feature to be enabled.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &SecurityEvent) {
        if event.is_alert() {
            tracing::warn!(
                target: "login_shield::events",
                event_name = event.name(),
                ?event,
                "security alert"
            );
        } else {
            tracing::info!(
                target: "login_shield::events",
                event_name = event.name(),
                ?event,
                "security event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_tracing_listener_handle() {
        let listener = TracingListener;
        let event = SecurityEvent::LoginDenied {
            identity: "a@example.com".to_owned(),
            source_address: "1.2.3.4".to_owned(),
            score: 70,
            warnings: vec!["Login from high-risk country: Russia".to_owned()],
            at: Utc::now(),
        };

        // should not panic
        listener.handle(&event).await;
    }
}
