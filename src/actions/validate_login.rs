use chrono::Utc;

use crate::anomaly::{LocationAnomaly, LocationAnomalyDetector};
use crate::config::{AnomalyConfig, ShieldConfig};
use crate::events::{SecurityEvent, dispatch};
use crate::lookup::with_timeout;
use crate::rate_limit::{LoginRateLimiter, RateLimitStatus};
use crate::risk::{RiskLevel, RiskPolicy};
use crate::{FailureKind, GeoLocator, LoginHistoryRepository, RiskAssessment, ShieldError};

/// Decides whether a login attempt may proceed to credential checks.
///
/// The pipeline is linear:
///
/// 1. Resolve the caller's location. If that fails the login is allowed at
///    medium risk with a "location undetermined" warning.
/// 2. Count the attempt against the source address. An exhausted window is
///    a hard deny and ends the evaluation.
/// 3. Warn on a high-risk country.
/// 4. Compare the location with the identity's login history.
/// 5. Score the attempt.
/// 6. Deny only when the level is high, the location is unfamiliar and the
///    country is high-risk. Everything else is allowed, possibly with
///    warnings.
///
/// The geo and history lookups run concurrently and are each bounded by
/// the configured lookup timeout.
pub struct ValidateLoginAction<G: GeoLocator, H: LoginHistoryRepository> {
    geo_locator: G,
    detector: LocationAnomalyDetector<H>,
    rate_limiter: LoginRateLimiter,
    policy: RiskPolicy,
    lookup_timeout: std::time::Duration,
}

impl<G: GeoLocator, H: LoginHistoryRepository> ValidateLoginAction<G, H> {
    /// Creates the action with default anomaly thresholds, risk policy and
    /// lookup timeout. For custom settings, use [`with_config`].
    ///
    /// [`with_config`]: Self::with_config
    pub fn new(geo_locator: G, history: H, rate_limiter: LoginRateLimiter) -> Self {
        Self::with_config(geo_locator, history, rate_limiter, &ShieldConfig::default())
    }

    /// The rate limiter carries its own [`RateLimitConfig`](crate::config::RateLimitConfig);
    /// build it from `config.rate_limit` to keep the two in sync.
    pub fn with_config(
        geo_locator: G,
        history: H,
        rate_limiter: LoginRateLimiter,
        config: &ShieldConfig,
    ) -> Self {
        Self {
            geo_locator,
            detector: LocationAnomalyDetector::with_config(history, config.anomaly.clone()),
            rate_limiter,
            policy: config.risk.clone(),
            lookup_timeout: config.lookup_timeout,
        }
    }

    #[must_use]
    pub fn policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn anomaly_config(mut self, config: AnomalyConfig) -> Self {
        self.detector = self.detector.reconfigure(config);
        self
    }

    #[must_use]
    pub fn lookup_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Evaluates a login attempt by `identity`.
    ///
    /// `caller_address` is forwarded to the geo lookup; pass `None` to let
    /// the geo service resolve the caller itself.
    ///
    /// # Returns
    ///
    /// - `Ok(assessment)` - check [`RiskAssessment::allowed`]
    /// - `Err(_)` - the rate-limit store failed
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "validate_login", skip_all, err)
    )]
    pub async fn execute(
        &self,
        identity: &str,
        caller_address: Option<&str>,
    ) -> Result<RiskAssessment, ShieldError> {
        let (geo, history) = tokio::join!(
            with_timeout(
                self.lookup_timeout,
                "geo lookup",
                self.geo_locator.locate(caller_address)
            ),
            with_timeout(
                self.lookup_timeout,
                "login history lookup",
                self.detector.load_history(identity)
            ),
        );

        let geo = match geo {
            Ok(geo) => geo,
            Err(failure) => {
                match failure.kind {
                    FailureKind::Timeout | FailureKind::Unavailable => log::warn!(
                        target: "login_shield",
                        "msg=\"geo lookup failed, allowing with caution\", kind={}, error=\"{}\"",
                        failure.kind,
                        failure.detail
                    ),
                    FailureKind::Malformed => log::error!(
                        target: "login_shield",
                        "msg=\"geo lookup returned unusable data, allowing with caution\", error=\"{}\"",
                        failure.detail
                    ),
                }
                dispatch(SecurityEvent::LocationUndetermined {
                    identity: identity.to_owned(),
                    failure: failure.kind,
                    at: Utc::now(),
                })
                .await;
                return Ok(RiskAssessment::location_undetermined());
            }
        };

        let remaining = match self.rate_limiter.check_rate_limit(&geo.source_address).await? {
            RateLimitStatus::Blocked {
                retry_after_minutes,
                message,
            } => {
                dispatch(SecurityEvent::LoginRateLimited {
                    identity: identity.to_owned(),
                    source_address: geo.source_address.clone(),
                    retry_after_minutes,
                    at: Utc::now(),
                })
                .await;
                return Ok(RiskAssessment::rate_limited(geo, retry_after_minutes, message));
            }
            RateLimitStatus::Allowed { remaining_attempts } => remaining_attempts,
        };
        // attempts before this one in the current window
        let prior_attempts = self
            .rate_limiter
            .max_attempts()
            .saturating_sub(remaining)
            .saturating_sub(1);

        let mut warnings = Vec::new();

        let high_risk_country = self.policy.is_high_risk(&geo.country_code);
        if high_risk_country {
            warnings.push(format!("Login from high-risk country: {}", geo.country));
        }

        let anomaly = match history {
            Ok(history) => self.detector.evaluate(&history, &geo),
            Err(failure) => {
                log::warn!(
                    target: "login_shield",
                    "msg=\"login history unavailable, skipping location check\", kind={}, error=\"{}\"",
                    failure.kind,
                    failure.detail
                );
                LocationAnomaly::normal()
            }
        };
        if let Some(reason) = &anomaly.reason {
            warnings.push(reason.clone());
        }

        let score = self
            .policy
            .calculate_score(&geo, anomaly.suspicious, prior_attempts);
        let level = RiskLevel::from_score(score);

        if let Some(reason) = anomaly.reason {
            dispatch(SecurityEvent::SuspiciousLogin {
                identity: identity.to_owned(),
                source_address: geo.source_address.clone(),
                reason,
                level,
                at: Utc::now(),
            })
            .await;
        }

        let denied = level == RiskLevel::High && anomaly.suspicious && high_risk_country;
        if denied {
            log::warn!(
                target: "login_shield",
                "msg=\"login denied by risk policy\", score={score}, country_code={}",
                geo.country_code
            );
            dispatch(SecurityEvent::LoginDenied {
                identity: identity.to_owned(),
                source_address: geo.source_address.clone(),
                score,
                warnings: warnings.clone(),
                at: Utc::now(),
            })
            .await;
        } else {
            log::debug!(
                target: "login_shield",
                "msg=\"login evaluated\", level={level}, score={score}, warnings={}",
                warnings.len()
            );
        }

        Ok(RiskAssessment::scored(geo, score, warnings, denied))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::MockClock;
    use crate::config::RateLimitConfig;
    use crate::rate_limit::InMemoryStore;
    use crate::{GeoSignal, MockGeoLocator, MockLoginHistoryRepository, Outcome};

    const IDENTITY: &str = "user@example.com";

    fn limiter(clock: &MockClock) -> LoginRateLimiter {
        let store = Arc::new(InMemoryStore::with_clock(Arc::new(clock.clone())));
        LoginRateLimiter::new(store, RateLimitConfig::default()).with_clock(Arc::new(clock.clone()))
    }

    fn indian_history() -> MockLoginHistoryRepository {
        MockLoginHistoryRepository::new().with_logins(IDENTITY, "India", "Mumbai", 10)
    }

    #[tokio::test]
    async fn test_familiar_login_is_low_and_allowed() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("India", "IN", "Mumbai"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        assert!(assessment.allowed());
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 0);
        assert!(assessment.warnings.is_empty());
        assert_eq!(assessment.geo.unwrap().country, "India");
    }

    #[tokio::test]
    async fn test_high_risk_new_country_is_denied() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("Russia", "RU", "Moscow"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        assert!(!assessment.allowed());
        assert_eq!(assessment.outcome, Outcome::PolicyDenied);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.score, 60);
        assert_eq!(
            assessment.warnings,
            vec![
                "Login from high-risk country: Russia".to_owned(),
                "Login from new country: Russia (usual: India)".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn test_high_risk_country_without_anomaly_is_allowed_with_warning() {
        let clock = MockClock::default();
        let history = MockLoginHistoryRepository::new().with_logins(IDENTITY, "Russia", "Moscow", 5);
        let geo = MockGeoLocator::returning(GeoSignal::mock("Russia", "RU", "Moscow"));
        let action = ValidateLoginAction::new(geo, history, limiter(&clock));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        assert!(assessment.allowed());
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.score, 40);
        assert_eq!(assessment.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_new_safe_country_is_allowed_with_warning() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("Germany", "DE", "Berlin"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        assert!(assessment.allowed());
        assert_eq!(assessment.score, 20);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(
            assessment.warnings,
            vec!["Login from new country: Germany (usual: India)".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_geo_failure_fails_open_at_medium() {
        for kind in [FailureKind::Unavailable, FailureKind::Malformed, FailureKind::Timeout] {
            let clock = MockClock::default();
            let action = ValidateLoginAction::new(
                MockGeoLocator::failing(kind),
                indian_history(),
                limiter(&clock),
            );

            let assessment = action.execute(IDENTITY, None).await.unwrap();

            assert!(assessment.allowed());
            assert_eq!(assessment.level, RiskLevel::Medium);
            assert_eq!(RiskLevel::from_score(assessment.score), RiskLevel::Medium);
            assert_eq!(assessment.warnings, vec!["location undetermined".to_owned()]);
            assert!(assessment.geo.is_none());
        }
    }

    #[tokio::test]
    async fn test_slow_geo_lookup_times_out_and_fails_open() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("Russia", "RU", "Moscow"))
            .with_delay(Duration::from_millis(500));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock))
            .lookup_timeout(Duration::from_millis(20));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        assert!(assessment.allowed());
        assert_eq!(assessment.warnings, vec!["location undetermined".to_owned()]);
    }

    #[tokio::test]
    async fn test_history_failure_skips_location_check() {
        let clock = MockClock::default();
        let history = indian_history();
        history.fail_reads(FailureKind::Unavailable);
        let geo = MockGeoLocator::returning(GeoSignal::mock("Russia", "RU", "Moscow"));
        let action = ValidateLoginAction::new(geo, history, limiter(&clock));

        let assessment = action.execute(IDENTITY, None).await.unwrap();

        // high-risk country alone cannot deny
        assert!(assessment.allowed());
        assert_eq!(assessment.score, 40);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_rate_limit_denies_before_scoring() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("India", "IN", "Mumbai"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        for _ in 0..5 {
            assert!(action.execute(IDENTITY, None).await.unwrap().allowed());
        }

        let assessment = action.execute(IDENTITY, None).await.unwrap();
        assert!(!assessment.allowed());
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(matches!(
            assessment.outcome,
            Outcome::RateLimited { retry_after_minutes: 15, .. }
        ));
    }

    #[tokio::test]
    async fn test_prior_attempts_raise_score() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("India", "IN", "Mumbai"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        let mut scores = Vec::new();
        for _ in 0..5 {
            scores.push(action.execute(IDENTITY, None).await.unwrap().score);
        }

        assert_eq!(scores, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn test_caller_address_forwarded_to_geo() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("India", "IN", "Mumbai"));
        let calls = Arc::clone(&geo.calls);
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock));

        action.execute(IDENTITY, Some("203.0.113.7")).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![Some("203.0.113.7".to_owned())]);
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let clock = MockClock::default();
        let geo = MockGeoLocator::returning(GeoSignal::mock("Brazil", "BR", "Recife"));
        let action = ValidateLoginAction::new(geo, indian_history(), limiter(&clock))
            .policy(RiskPolicy::new(["BR"]));

        let assessment = action.execute(IDENTITY, None).await.unwrap();
        assert_eq!(assessment.outcome, Outcome::PolicyDenied);
    }

    #[tokio::test]
    async fn test_custom_anomaly_thresholds() {
        let clock = MockClock::default();
        let history = MockLoginHistoryRepository::new().with_logins(IDENTITY, "India", "Mumbai", 1);
        let geo = MockGeoLocator::returning(GeoSignal::mock("Russia", "RU", "Moscow"));
        let action = ValidateLoginAction::new(geo, history, limiter(&clock)).anomaly_config(AnomalyConfig {
            min_history: 1,
            ..AnomalyConfig::default()
        });

        let assessment = action.execute(IDENTITY, None).await.unwrap();
        assert_eq!(assessment.outcome, Outcome::PolicyDenied);
    }
}
