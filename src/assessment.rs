use serde::Serialize;

use crate::geo::GeoSignal;
use crate::risk::{HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD, RiskLevel, clamp_score};

pub(crate) const LOCATION_UNDETERMINED: &str = "location undetermined";

/// How an evaluation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Allowed,
    /// Too many attempts from this source; nothing else was evaluated.
    RateLimited {
        retry_after_minutes: i64,
        message: String,
    },
    /// High risk, unfamiliar location and a high-risk country together.
    PolicyDenied,
}

/// Result of evaluating one login attempt.
///
/// Every branch of the pipeline fills the same fields, so callers can log or
/// serialize it without checking which path produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// `0..=100`.
    pub score: u32,
    pub warnings: Vec<String>,
    pub outcome: Outcome,
    /// `None` when the location could not be determined.
    pub geo: Option<GeoSignal>,
}

impl RiskAssessment {
    pub fn allowed(&self) -> bool {
        self.outcome == Outcome::Allowed
    }

    /// Scored at the bottom of the medium band.
    pub(crate) fn location_undetermined() -> Self {
        Self {
            level: RiskLevel::Medium,
            score: MEDIUM_RISK_THRESHOLD,
            warnings: vec![LOCATION_UNDETERMINED.to_owned()],
            outcome: Outcome::Allowed,
            geo: None,
        }
    }

    pub(crate) fn rate_limited(geo: GeoSignal, retry_after_minutes: i64, message: String) -> Self {
        Self {
            level: RiskLevel::High,
            score: HIGH_RISK_THRESHOLD,
            warnings: vec![message.clone()],
            outcome: Outcome::RateLimited {
                retry_after_minutes,
                message,
            },
            geo: Some(geo),
        }
    }

    pub(crate) fn scored(
        geo: GeoSignal,
        raw_score: u32,
        warnings: Vec<String>,
        denied: bool,
    ) -> Self {
        Self {
            level: RiskLevel::from_score(raw_score),
            score: clamp_score(raw_score),
            warnings,
            outcome: if denied {
                Outcome::PolicyDenied
            } else {
                Outcome::Allowed
            },
            geo: Some(geo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_undetermined_fails_open() {
        let assessment = RiskAssessment::location_undetermined();

        assert!(assessment.allowed());
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.score, MEDIUM_RISK_THRESHOLD);
        assert_eq!(assessment.warnings, vec!["location undetermined".to_owned()]);
        assert!(assessment.geo.is_none());
    }

    #[test]
    fn test_rate_limited_is_denied_high() {
        let geo = GeoSignal::mock("India", "IN", "Mumbai");
        let assessment = RiskAssessment::rate_limited(geo, 4, "wait".to_owned());

        assert!(!assessment.allowed());
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(matches!(
            assessment.outcome,
            Outcome::RateLimited { retry_after_minutes: 4, .. }
        ));
    }

    #[test]
    fn test_scored_clamps_but_keeps_level() {
        let geo = GeoSignal::mock("Russia", "RU", "Moscow");
        let assessment = RiskAssessment::scored(geo, 180, vec![], true);

        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.outcome, Outcome::PolicyDenied);
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::RateLimited {
            retry_after_minutes: 2,
            message: "slow down".to_owned(),
        })
        .unwrap();

        assert_eq!(json["outcome"], "rate_limited");
        assert_eq!(json["retry_after_minutes"], 2);
        assert_eq!(serde_json::to_value(Outcome::Allowed).unwrap()["outcome"], "allowed");
    }

    #[test]
    fn test_level_always_matches_score() {
        let geo = GeoSignal::mock("India", "IN", "Mumbai");
        let assessments = [
            RiskAssessment::location_undetermined(),
            RiskAssessment::rate_limited(geo.clone(), 15, "wait".to_owned()),
            RiskAssessment::scored(geo.clone(), 0, vec![], false),
            RiskAssessment::scored(geo.clone(), 30, vec![], false),
            RiskAssessment::scored(geo, 70, vec![], true),
        ];

        for assessment in assessments {
            assert_eq!(RiskLevel::from_score(assessment.score), assessment.level);
        }
    }
}
