//! Configuration types for login risk evaluation.
//!
//! All thresholds live here so they can be tuned per deployment. The whole
//! tree deserializes from JSON, which lets operators update the high-risk
//! country list without a rebuild.
//!
//! # Example
//!
//! ```rust
//! use login_shield::config::{RateLimitConfig, ShieldConfig};
//! use chrono::Duration;
//!
//! // Use defaults
//! let config = ShieldConfig::default();
//!
//! // Or customize
//! let config = ShieldConfig {
//!     rate_limit: RateLimitConfig {
//!         max_attempts: 3,
//!         window: Duration::minutes(30),
//!     },
//!     ..Default::default()
//! };
//!
//! // Or load from JSON; missing fields keep their defaults
//! let config = ShieldConfig::from_json(r#"{ "risk": { "high_risk_countries": ["KP"] } }"#).unwrap();
//! assert!(config.risk.is_high_risk("kp"));
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ShieldError;
use crate::risk::RiskPolicy;

/// Top-level configuration.
///
/// Use `ShieldConfig::default()` for production defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Per-source attempt limiting.
    pub rate_limit: RateLimitConfig,

    /// Location anomaly detection.
    pub anomaly: AnomalyConfig,

    /// Risk scoring policy data.
    pub risk: RiskPolicy,

    /// Upper bound for each collaborator lookup (geo, login history).
    ///
    /// A lookup that runs longer fails open. Default: 4 seconds
    #[serde(rename = "lookup_timeout_ms", with = "std_duration_millis")]
    pub lookup_timeout: std::time::Duration,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            anomaly: AnomalyConfig::default(),
            risk: RiskPolicy::default(),
            lookup_timeout: std::time::Duration::from_secs(4),
        }
    }
}

impl ShieldConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient settings for development and testing.
    pub fn development() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_attempts: 20,
                window: Duration::minutes(5),
            },
            lookup_timeout: std::time::Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Fewer attempts, a longer window, and a shorter lookup budget.
    pub fn strict() -> Self {
        Self {
            rate_limit: RateLimitConfig {
                max_attempts: 3,
                window: Duration::minutes(30),
            },
            anomaly: AnomalyConfig {
                city_variety_threshold: 3,
                ..AnomalyConfig::default()
            },
            lookup_timeout: std::time::Duration::from_secs(3),
            ..Self::default()
        }
    }

    /// Parses a JSON document. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ShieldError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            log::error!(target: "login_shield", "msg=\"config parse failed\", error=\"{e}\"");
            ShieldError::InvalidConfig(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShieldError> {
        if self.rate_limit.max_attempts == 0 {
            return Err(ShieldError::InvalidConfig(
                "rate_limit.max_attempts must be positive".to_owned(),
            ));
        }
        if self.rate_limit.window <= Duration::zero() {
            return Err(ShieldError::InvalidConfig(
                "rate_limit.window_secs must be positive".to_owned(),
            ));
        }
        if self.anomaly.history_limit < self.anomaly.min_history {
            return Err(ShieldError::InvalidConfig(
                "anomaly.history_limit must be at least anomaly.min_history".to_owned(),
            ));
        }
        if self.lookup_timeout.is_zero() {
            return Err(ShieldError::InvalidConfig(
                "lookup_timeout_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Attempt limiting per source address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Attempts allowed inside one window.
    ///
    /// Default: 5
    pub max_attempts: u32,

    /// Window length, measured from the first attempt.
    ///
    /// Default: 15 minutes
    #[serde(rename = "window_secs", with = "chrono_duration_secs")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
        }
    }
}

impl RateLimitConfig {
    #[inline]
    pub fn window_minutes(&self) -> i64 {
        self.window.num_minutes()
    }
}

/// Thresholds for the location pattern matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// How many recent successful logins to compare against.
    ///
    /// Default: 50
    pub history_limit: usize,

    /// Below this many records the history is too thin to judge.
    ///
    /// Default: 3
    pub min_history: usize,

    /// An unfamiliar city is only flagged once the identity has logged in
    /// from more than this many distinct cities.
    ///
    /// Default: 5
    pub city_variety_threshold: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            min_history: 3,
            city_variety_threshold: 5,
        }
    }
}

mod chrono_duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs).ok_or_else(|| de::Error::custom("duration out of range"))
    }
}

mod std_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &std::time::Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<std::time::Duration, D::Error> {
        u64::deserialize(deserializer).map(std::time::Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShieldConfig::default();

        assert_eq!(config.rate_limit.max_attempts, 5);
        assert_eq!(config.rate_limit.window, Duration::minutes(15));
        assert_eq!(config.anomaly.history_limit, 50);
        assert_eq!(config.anomaly.min_history, 3);
        assert_eq!(config.anomaly.city_variety_threshold, 5);
        assert_eq!(config.lookup_timeout, std::time::Duration::from_secs(4));
        assert!(config.risk.is_high_risk("RU"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_config() {
        let config = ShieldConfig::strict();

        assert_eq!(config.rate_limit.max_attempts, 3);
        assert_eq!(config.rate_limit.window_minutes(), 30);
        assert_eq!(config.anomaly.city_variety_threshold, 3);
    }

    #[test]
    fn test_development_config() {
        let config = ShieldConfig::development();

        assert_eq!(config.rate_limit.max_attempts, 20);
        assert_eq!(config.rate_limit.window_minutes(), 5);
    }

    #[test]
    fn test_from_json_overrides_and_defaults() {
        let config = ShieldConfig::from_json(
            r#"{
                "rate_limit": { "max_attempts": 10, "window_secs": 600 },
                "risk": { "high_risk_countries": ["br", "IN"] },
                "lookup_timeout_ms": 2500
            }"#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_attempts, 10);
        assert_eq!(config.rate_limit.window, Duration::minutes(10));
        assert_eq!(config.lookup_timeout, std::time::Duration::from_millis(2500));
        assert!(config.risk.is_high_risk("BR"));
        assert!(config.risk.is_high_risk("in"));
        assert!(!config.risk.is_high_risk("RU"));
        // untouched section keeps defaults
        assert_eq!(config.anomaly.history_limit, 50);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let err = ShieldConfig::from_json(r#"{ "rate_limit": { "max_attempts": 0 } }"#).unwrap_err();
        assert!(matches!(err, ShieldError::InvalidConfig(_)));

        let err = ShieldConfig::from_json(r#"{ "anomaly": { "history_limit": 2 } }"#).unwrap_err();
        assert!(matches!(err, ShieldError::InvalidConfig(_)));

        let err = ShieldConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ShieldError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_serializes_round_trip_fields() {
        let json = serde_json::to_value(ShieldConfig::default()).unwrap();

        assert_eq!(json["rate_limit"]["window_secs"], 900);
        assert_eq!(json["lookup_timeout_ms"], 4000);
    }
}
