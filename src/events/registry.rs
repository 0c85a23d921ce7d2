use std::sync::OnceLock;

use super::{Listener, SecurityEvent};

static REGISTRY: OnceLock<EventRegistry> = OnceLock::new();

/// Registered event listeners.
///
/// Use [`register_event_listeners`] to configure listeners at application startup.
pub struct EventRegistry {
    listeners: Vec<Box<dyn Listener>>,
}

impl EventRegistry {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Listeners are called in the order they are registered.
    pub fn listen(&mut self, listener: impl Listener) -> &mut Self {
        self.listeners.push(Box::new(listener));
        self
    }

    async fn dispatch(&self, event: &SecurityEvent) {
        for listener in &self.listeners {
            listener.handle(event).await;
        }
    }
}

/// Register event listeners at application startup.
///
/// Only the first call takes effect; later calls log a warning. If never
/// called, events are dropped.
///
/// ```rust,ignore
/// use login_shield::register_event_listeners;
/// use login_shield::events::listeners::LoggingListener;
///
/// register_event_listeners(|registry| {
///     registry
///         .listen(LoggingListener::new())
///         .listen(AdminPager);
/// });
/// ```
pub fn register_event_listeners<F>(f: F)
where
    F: FnOnce(&mut EventRegistry),
{
    let mut registry = EventRegistry::new();
    f(&mut registry);
    if REGISTRY.set(registry).is_err() {
        log::warn!(
            target: "login_shield",
            "register_event_listeners called more than once, ignoring"
        );
    }
}

/// Dispatch an event to all registered listeners. No-op without listeners.
pub async fn dispatch(event: SecurityEvent) {
    if let Some(registry) = REGISTRY.get() {
        registry.dispatch(&event).await;
    }
}
