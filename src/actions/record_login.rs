use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::events::{SecurityEvent, dispatch};
use crate::rate_limit::LoginRateLimiter;
use crate::{GeoSignal, LoginHistoryRepository, LoginRecord, LoginStatus, ShieldError};

/// Records the outcome of a credential check.
///
/// Call this after authentication with the geo signal from the assessment.
/// A success is appended to the login history (feeding future location
/// checks) and clears the source's attempt counter. A failure is appended
/// as failed and counted against the source.
///
/// The gate's rate check already counted the attempt, so a failed password
/// after [`ValidateLoginAction`](crate::actions::ValidateLoginAction) uses
/// two slots of the window: with the default 5 attempts, the third failed
/// password in a window is the last one evaluated.
///
/// The rate limiter is updated even when the history write fails; the
/// history error is returned afterwards.
pub struct RecordLoginAction<H: LoginHistoryRepository> {
    history: H,
    rate_limiter: LoginRateLimiter,
    clock: Arc<dyn Clock>,
}

impl<H: LoginHistoryRepository> RecordLoginAction<H> {
    pub fn new(history: H, rate_limiter: LoginRateLimiter) -> Self {
        Self {
            history,
            rate_limiter,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "record_login", skip_all, err)
    )]
    pub async fn execute(
        &self,
        identity: &str,
        geo: &GeoSignal,
        succeeded: bool,
    ) -> Result<(), ShieldError> {
        let now = self.clock.now();
        let status = if succeeded {
            LoginStatus::Success
        } else {
            LoginStatus::Failed
        };

        // limiter before history: failures must count even when the write fails
        if succeeded {
            self.rate_limiter.reset_rate_limit(&geo.source_address).await?;
        } else {
            self.rate_limiter
                .record_failed_attempt(&geo.source_address)
                .await?;
        }

        let record = LoginRecord::from_geo(identity, status, geo, now);
        let stored = self.history.record_login(&record).await;
        if let Err(e) = &stored {
            log::error!(target: "login_shield", "msg=\"login history write failed\", status={status}, error=\"{e}\"");
        } else {
            log::info!(target: "login_shield", "msg=\"login recorded\", status={status}");
        }

        let source_address = geo.source_address.clone();
        let identity = identity.to_owned();
        let event = if succeeded {
            SecurityEvent::LoginSucceeded {
                identity,
                source_address,
                at: now,
            }
        } else {
            SecurityEvent::LoginFailed {
                identity,
                source_address,
                at: now,
            }
        };
        dispatch(event).await;

        stored
    }
}
