//! Security event emitter.
//!
//! The decision gate and the login recorder fire a [`SecurityEvent`] for
//! every notable outcome: rate limiting, suspicious locations, policy
//! denials, and recorded logins. Delivery is fire-and-forget. If no
//! listeners are registered, events are silently ignored.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use login_shield::register_event_listeners;
//! use login_shield::events::listeners::LoggingListener;
//!
//! fn main() {
//!     register_event_listeners(|registry| {
//!         registry.listen(LoggingListener::new());
//!     });
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::SecurityEvent;
pub use listener::Listener;
pub use registry::{EventRegistry, dispatch, register_event_listeners};
