#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use super::Clock;

/// Clock whose time only moves when told to.
///
/// Clones share the same time, so a test can hand one clone to the rate
/// limiter and keep another to advance.
///
/// ```rust,ignore
/// use chrono::{Duration, Utc};
/// use login_shield::clock::{Clock, MockClock};
///
/// let start = Utc::now();
/// let clock = MockClock::new(start);
/// clock.advance(Duration::minutes(16));
/// assert_eq!(clock.now(), start + Duration::minutes(16));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap();
        *current = at;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}
