use async_trait::async_trait;

use super::SecurityEvent;

/// Receives security events.
///
/// Implement this to forward alerts to administrators (email, push,
/// chat webhook). Delivery is one-way: the pipeline never waits on a
/// result and listeners should not fail loudly.
///
/// # Example
///
/// ```rust,ignore
/// use login_shield::events::{Listener, SecurityEvent};
/// use async_trait::async_trait;
///
/// struct AdminPager;
///
/// #[async_trait]
/// impl Listener for AdminPager {
///     async fn handle(&self, event: &SecurityEvent) {
///         if event.is_alert() {
///             // page the on-call admin
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle(&self, event: &SecurityEvent);
}
