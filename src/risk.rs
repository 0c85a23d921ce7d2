//! Risk scoring.
//!
//! The score is additive over three signals and the tier is a step function
//! of the score:
//!
//! | Signal | Points |
//! |--------|--------|
//! | country on the high-risk list | 40 |
//! | location unfamiliar for this identity | 20 |
//! | each prior attempt from the same source in the window | 10 |
//!
//! | Score | Level |
//! |-------|-------|
//! | `< 25` | [`RiskLevel::Low`] |
//! | `25..=49` | [`RiskLevel::Medium`] |
//! | `>= 50` | [`RiskLevel::High`] |

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::geo::GeoSignal;

pub const HIGH_RISK_COUNTRY_POINTS: u32 = 40;
pub const NEW_LOCATION_POINTS: u32 = 20;
pub const FAILED_ATTEMPT_POINTS: u32 = 10;

pub const MEDIUM_RISK_THRESHOLD: u32 = 25;
pub const HIGH_RISK_THRESHOLD: u32 = 50;

/// Reported scores never exceed this.
pub const MAX_SCORE: u32 = 100;

const DEFAULT_HIGH_RISK_COUNTRIES: [&str; 6] = ["RU", "CN", "KP", "IR", "NG", "UA"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= HIGH_RISK_THRESHOLD {
            Self::High
        } else if score >= MEDIUM_RISK_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy data for scoring: which countries count as high-risk.
///
/// Country codes are stored as upper-case ISO 3166-1 alpha-2 and matched
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    #[serde(deserialize_with = "normalized_codes")]
    high_risk_countries: Vec<String>,
}

fn normalized_codes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(RiskPolicy::new(raw).high_risk_countries)
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_RISK_COUNTRIES)
    }
}

impl RiskPolicy {
    #[must_use]
    pub fn new<I, S>(high_risk_countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut codes: Vec<String> = Vec::new();
        for code in high_risk_countries {
            let code = code.as_ref().trim().to_ascii_uppercase();
            if !code.is_empty() && !codes.contains(&code) {
                codes.push(code);
            }
        }
        Self {
            high_risk_countries: codes,
        }
    }

    /// A policy with an empty list; only location and attempts score.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            high_risk_countries: Vec::new(),
        }
    }

    pub fn high_risk_countries(&self) -> &[String] {
        &self.high_risk_countries
    }

    pub fn is_high_risk(&self, country_code: &str) -> bool {
        let country_code = country_code.trim();
        self.high_risk_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country_code))
    }

    /// Raw additive score. May exceed [`MAX_SCORE`]; see [`clamp_score`].
    pub fn calculate_score(
        &self,
        geo: &GeoSignal,
        is_new_location: bool,
        failed_attempt_count: u32,
    ) -> u32 {
        let mut score = 0u32;

        if self.is_high_risk(&geo.country_code) {
            score += HIGH_RISK_COUNTRY_POINTS;
        }
        if is_new_location {
            score += NEW_LOCATION_POINTS;
        }

        score.saturating_add(failed_attempt_count.saturating_mul(FAILED_ATTEMPT_POINTS))
    }

    pub fn calculate_risk_level(
        &self,
        geo: &GeoSignal,
        is_new_location: bool,
        failed_attempt_count: u32,
    ) -> RiskLevel {
        RiskLevel::from_score(self.calculate_score(geo, is_new_location, failed_attempt_count))
    }
}

pub fn clamp_score(score: u32) -> u32 {
    score.min(MAX_SCORE)
}
