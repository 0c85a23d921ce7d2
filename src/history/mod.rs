//! Login history storage.
//!
//! The pattern matcher reads prior successful logins through
//! [`LoginHistoryRepository`]; [`RecordLoginAction`](crate::actions::RecordLoginAction)
//! writes them. Implement the trait over your own table, or use the
//! `SQLite` implementation behind the `sqlx_sqlite` feature.

#[cfg(any(test, feature = "mocks"))]
mod mock;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoSignal;
use crate::{LookupFailure, ShieldError};

#[cfg(any(test, feature = "mocks"))]
pub use mock::MockLoginHistoryRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginStatus {
    Success,
    Failed,
}

impl LoginStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginStatus {
    type Err = LookupFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(LookupFailure::malformed(format!("unknown login status '{other}'"))),
        }
    }
}

/// One past login attempt.
///
/// `country` and `city` are `None` when the location was not known at the
/// time of the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub identity: String,
    pub status: LoginStatus,
    pub country: Option<String>,
    pub city: Option<String>,
    pub ip_address: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl LoginRecord {
    pub fn from_geo(
        identity: &str,
        status: LoginStatus,
        geo: &GeoSignal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.to_owned(),
            status,
            country: Some(geo.country.clone()),
            city: Some(geo.city.clone()).filter(|c| !c.is_empty()),
            ip_address: Some(geo.source_address.clone()),
            recorded_at,
        }
    }

    #[cfg(any(test, feature = "mocks"))]
    pub fn mock_success(identity: &str, country: &str, city: &str) -> Self {
        Self {
            identity: identity.to_owned(),
            status: LoginStatus::Success,
            country: Some(country.to_owned()),
            city: Some(city.to_owned()),
            ip_address: Some("198.51.100.20".to_owned()),
            recorded_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait LoginHistoryRepository: Send + Sync {
    /// Up to `limit` records for `identity` with `status`, most recent first.
    async fn recent_logins(
        &self,
        identity: &str,
        status: LoginStatus,
        limit: usize,
    ) -> Result<Vec<LoginRecord>, LookupFailure>;

    async fn record_login(&self, record: &LoginRecord) -> Result<(), ShieldError>;
}
