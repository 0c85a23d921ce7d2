use std::sync::Arc;

use chrono::Duration;

use super::store::{AttemptRecord, RateLimitStore};
use crate::ShieldError;
use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;

const KEY_PREFIX: &str = "login";

/// Verdict of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitStatus {
    /// Attempt counted. Contains attempts left in the current window.
    Allowed { remaining_attempts: u32 },
    /// Window exhausted.
    Blocked {
        retry_after_minutes: i64,
        message: String,
    },
}

impl RateLimitStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Zero when blocked.
    pub fn remaining_attempts(&self) -> u32 {
        match self {
            Self::Allowed { remaining_attempts } => *remaining_attempts,
            Self::Blocked { .. } => 0,
        }
    }
}

/// Fixed-window attempt limiter keyed by source address.
///
/// Every [`check_rate_limit`](Self::check_rate_limit) counts as an attempt.
/// Once `max_attempts` have been counted in a window, further checks are
/// blocked until the window (measured from its first attempt) is over.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use login_shield::config::RateLimitConfig;
/// use login_shield::rate_limit::{InMemoryStore, LoginRateLimiter};
///
/// let limiter = LoginRateLimiter::new(Arc::new(InMemoryStore::new()), RateLimitConfig::default());
///
/// let status = limiter.check_rate_limit("203.0.113.7").await?;
/// assert_eq!(status.remaining_attempts(), 4);
/// ```
#[derive(Clone)]
pub struct LoginRateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl LoginRateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Counts an attempt from `source_key` and reports whether it may proceed.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "check_rate_limit", skip(self), err))]
    pub async fn check_rate_limit(&self, source_key: &str) -> Result<RateLimitStatus, ShieldError> {
        let now = self.clock.now();
        let key = storage_key(source_key);
        let max = self.config.max_attempts;

        match self.live_record(&key).await? {
            Some(record) if record.count >= max => {
                let wait = record.window_ends_at(self.config.window) - now;
                let minutes = minutes_rounded_up(wait);

                log::warn!(
                    target: "login_shield",
                    "msg=\"rate limit exceeded\", attempts={}, retry_after_minutes={minutes}",
                    record.count
                );

                Ok(RateLimitStatus::Blocked {
                    retry_after_minutes: minutes,
                    message: blocked_message(minutes),
                })
            }
            Some(mut record) => {
                record.count += 1;
                self.store
                    .set(&key, &record, record.window_ends_at(self.config.window) - now)
                    .await?;

                Ok(RateLimitStatus::Allowed {
                    remaining_attempts: max.saturating_sub(record.count),
                })
            }
            None => {
                let record = AttemptRecord::start(source_key, now);
                self.store.set(&key, &record, self.config.window).await?;

                Ok(RateLimitStatus::Allowed {
                    remaining_attempts: max.saturating_sub(1),
                })
            }
        }
    }

    /// Counts a failed attempt without producing a verdict.
    pub async fn record_failed_attempt(&self, source_key: &str) -> Result<(), ShieldError> {
        let now = self.clock.now();
        let key = storage_key(source_key);

        let (record, ttl) = match self.live_record(&key).await? {
            Some(mut record) => {
                record.count = record.count.saturating_add(1);
                let ttl = record.window_ends_at(self.config.window) - now;
                (record, ttl)
            }
            None => (AttemptRecord::start(source_key, now), self.config.window),
        };

        log::debug!(
            target: "login_shield",
            "msg=\"failed attempt recorded\", attempts={}",
            record.count
        );

        self.store.set(&key, &record, ttl).await
    }

    /// Attempts counted in the current window; 0 when there is none.
    pub async fn failed_attempts(&self, source_key: &str) -> Result<u32, ShieldError> {
        Ok(self
            .live_record(&storage_key(source_key))
            .await?
            .map_or(0, |record| record.count))
    }

    /// Forgets `source_key`; call after a confirmed successful login.
    pub async fn reset_rate_limit(&self, source_key: &str) -> Result<(), ShieldError> {
        self.store.delete(&storage_key(source_key)).await
    }

    async fn live_record(&self, key: &str) -> Result<Option<AttemptRecord>, ShieldError> {
        let now = self.clock.now();
        Ok(self
            .store
            .get(key)
            .await?
            .filter(|record| !record.is_expired(now, self.config.window)))
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn storage_key(source_key: &str) -> String {
    format!("{KEY_PREFIX}:{source_key}")
}

fn minutes_rounded_up(wait: Duration) -> i64 {
    let secs = wait.num_seconds().max(0);
    ((secs + 59) / 60).max(1)
}

fn blocked_message(minutes: i64) -> String {
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!("Too many login attempts. Please try again in {minutes} {unit}.")
}
