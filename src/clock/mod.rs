//! Time sources.
//!
//! The rate limiter and the in-memory store read the current time through
//! [`Clock`] so windows can be exercised without sleeping. Production code
//! uses [`SystemClock`]; tests use `MockClock` (with the `mocks` feature or in
//! test builds).

#[cfg(any(test, feature = "mocks"))]
mod mock;

use chrono::{DateTime, Utc};

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockClock;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
