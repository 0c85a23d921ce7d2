//! Login risk scoring for sign-in flows.
//!
//! `login_shield` evaluates a login attempt before credentials are checked and
//! returns a [`RiskAssessment`]: a score, a risk tier, a list of warnings and an
//! allow/deny outcome. It combines four pieces:
//!
//! | Piece | Module | Description |
//! |-------|--------|-------------|
//! | Rate limiter | [`rate_limit`] | attempts per source address in a fixed window |
//! | Pattern matcher | [`anomaly`] | compares the current location with past logins |
//! | Risk scorer | [`risk`] | bounded score and tier from the signals |
//! | Decision gate | [`actions`] | the pipeline that ties them together |
//!
//! Collaborators (geo lookup, login history, rate-limit storage) are traits so
//! they can be backed by HTTP services, `SQLite`, or the in-memory mocks.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use login_shield::actions::ValidateLoginAction;
//! use login_shield::geo::HttpGeoLocator;
//! use login_shield::rate_limit::{InMemoryStore, LoginRateLimiter};
//! use login_shield::ShieldConfig;
//!
//! let config = ShieldConfig::default();
//! let limiter = LoginRateLimiter::new(Arc::new(InMemoryStore::new()), config.rate_limit.clone());
//! let gate = ValidateLoginAction::with_config(HttpGeoLocator::new(), history, limiter, &config);
//!
//! let assessment = gate.execute("user@example.com", Some("203.0.113.7")).await?;
//! if !assessment.allowed() {
//!     // reject the login
//! }
//! ```

pub mod actions;
pub mod anomaly;
mod assessment;
pub mod clock;
pub mod config;
pub mod events;
pub mod geo;
pub mod history;
mod lookup;
pub mod rate_limit;
pub mod risk;
#[cfg(feature = "sqlx_sqlite")]
pub mod sqlite;

pub use assessment::{Outcome, RiskAssessment};
pub use config::ShieldConfig;
pub use events::register_event_listeners;
pub use geo::{GeoLocator, GeoSignal};
pub use history::{LoginHistoryRepository, LoginRecord, LoginStatus};
pub use lookup::{FailureKind, LookupFailure};
pub use risk::{RiskLevel, RiskPolicy};

#[cfg(any(test, feature = "mocks"))]
pub use geo::MockGeoLocator;
#[cfg(any(test, feature = "mocks"))]
pub use history::MockLoginHistoryRepository;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShieldError {
    /// The rate-limit store could not be read or written.
    StoreError(String),
    /// A configuration value is out of range or could not be parsed.
    InvalidConfig(String),
    DatabaseError(String),
}

impl std::error::Error for ShieldError {}

impl fmt::Display for ShieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShieldError::StoreError(msg) => write!(f, "Rate limit store error: {msg}"),
            ShieldError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            ShieldError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ShieldError::StoreError("lock poisoned".to_owned()).to_string(),
            "Rate limit store error: lock poisoned"
        );
        assert_eq!(
            ShieldError::InvalidConfig("max_attempts must be positive".to_owned()).to_string(),
            "Invalid configuration: max_attempts must be positive"
        );
        assert_eq!(
            ShieldError::DatabaseError("no such table".to_owned()).to_string(),
            "Database error: no such table"
        );
    }
}
