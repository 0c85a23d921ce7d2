use chrono::{DateTime, Utc};

use crate::FailureKind;
use crate::risk::RiskLevel;

/// Security events emitted while evaluating and recording logins.
///
/// Events are always fired. If no listeners are registered they are
/// silently ignored. Register listeners via
/// [`register_event_listeners`](crate::register_event_listeners) to forward
/// them to administrators.
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    // evaluation
    LocationUndetermined {
        identity: String,
        failure: FailureKind,
        at: DateTime<Utc>,
    },
    LoginRateLimited {
        identity: String,
        source_address: String,
        retry_after_minutes: i64,
        at: DateTime<Utc>,
    },
    SuspiciousLogin {
        identity: String,
        source_address: String,
        reason: String,
        level: RiskLevel,
        at: DateTime<Utc>,
    },
    LoginDenied {
        identity: String,
        source_address: String,
        score: u32,
        warnings: Vec<String>,
        at: DateTime<Utc>,
    },

    // outcome of authentication
    LoginSucceeded {
        identity: String,
        source_address: String,
        at: DateTime<Utc>,
    },
    LoginFailed {
        identity: String,
        source_address: String,
        at: DateTime<Utc>,
    },
}

impl SecurityEvent {
    /// Returns a dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocationUndetermined { .. } => "login.location_undetermined",
            Self::LoginRateLimited { .. } => "login.rate_limited",
            Self::SuspiciousLogin { .. } => "login.suspicious",
            Self::LoginDenied { .. } => "login.denied",
            Self::LoginSucceeded { .. } => "login.succeeded",
            Self::LoginFailed { .. } => "login.failed",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LocationUndetermined { at, .. }
            | Self::LoginRateLimited { at, .. }
            | Self::SuspiciousLogin { at, .. }
            | Self::LoginDenied { at, .. }
            | Self::LoginSucceeded { at, .. }
            | Self::LoginFailed { at, .. } => *at,
        }
    }

    /// Events an administrator should hear about.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::LoginRateLimited { .. } | Self::SuspiciousLogin { .. } | Self::LoginDenied { .. }
        )
    }
}
