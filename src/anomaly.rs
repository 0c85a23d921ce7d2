//! Location anomaly detection.
//!
//! A login is suspicious when it comes from a country the identity has never
//! logged in from, or from an unfamiliar city once the identity already has a
//! wide spread of cities. Identities with too little history are never
//! flagged.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::LookupFailure;
use crate::config::AnomalyConfig;
use crate::geo::GeoSignal;
use crate::history::{LoginHistoryRepository, LoginRecord, LoginStatus};

/// Countries and cities seen in an identity's recent successful logins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoricalLoginSet {
    pub usual_countries: BTreeSet<String>,
    pub usual_cities: BTreeSet<String>,
    /// Records the sets were built from, including ones without a location.
    pub record_count: usize,
    /// Records that carried a usable country. Only these count as history.
    pub located_count: usize,
}

impl HistoricalLoginSet {
    pub fn from_records(records: &[LoginRecord]) -> Self {
        let mut set = Self {
            record_count: records.len(),
            ..Self::default()
        };

        for record in records {
            if let Some(country) = record.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                set.usual_countries.insert(country.to_owned());
                set.located_count += 1;
            }
            if let Some(city) = record.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                set.usual_cities.insert(city.to_owned());
            }
        }

        set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationAnomaly {
    pub suspicious: bool,
    /// Set only when `suspicious`.
    pub reason: Option<String>,
}

impl LocationAnomaly {
    pub fn normal() -> Self {
        Self::default()
    }

    fn flagged(reason: String) -> Self {
        Self {
            suspicious: true,
            reason: Some(reason),
        }
    }
}

pub struct LocationAnomalyDetector<H: LoginHistoryRepository> {
    history: H,
    config: AnomalyConfig,
}

impl<H: LoginHistoryRepository> LocationAnomalyDetector<H> {
    pub fn new(history: H) -> Self {
        Self::with_config(history, AnomalyConfig::default())
    }

    pub fn with_config(history: H, config: AnomalyConfig) -> Self {
        Self { history, config }
    }

    #[must_use]
    pub fn reconfigure(mut self, config: AnomalyConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads history and compares `current` against it.
    ///
    /// Lookup failures are logged and treated as "not suspicious".
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "check_location_anomaly", skip_all)
    )]
    pub async fn check_location_anomaly(&self, identity: &str, current: &GeoSignal) -> LocationAnomaly {
        match self.load_history(identity).await {
            Ok(history) => self.evaluate(&history, current),
            Err(failure) => {
                log::warn!(
                    target: "login_shield",
                    "msg=\"login history unavailable, skipping location check\", kind={}, error=\"{}\"",
                    failure.kind,
                    failure.detail
                );
                LocationAnomaly::normal()
            }
        }
    }

    pub async fn load_history(&self, identity: &str) -> Result<HistoricalLoginSet, LookupFailure> {
        let records = self
            .history
            .recent_logins(identity, LoginStatus::Success, self.config.history_limit)
            .await?;

        Ok(HistoricalLoginSet::from_records(&records))
    }

    /// Country check first; the city check only runs for a known country.
    pub fn evaluate(&self, history: &HistoricalLoginSet, current: &GeoSignal) -> LocationAnomaly {
        if history.located_count < self.config.min_history {
            log::debug!(
                target: "login_shield",
                "msg=\"insufficient login history\", records={}, located={}",
                history.record_count,
                history.located_count
            );
            return LocationAnomaly::normal();
        }

        if !history.usual_countries.contains(current.country.trim()) {
            let known = history
                .usual_countries
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return LocationAnomaly::flagged(format!(
                "Login from new country: {} (usual: {known})",
                current.country
            ));
        }

        let city = current.city.trim();
        if !city.is_empty()
            && !history.usual_cities.contains(city)
            && history.usual_cities.len() > self.config.city_variety_threshold
        {
            return LocationAnomaly::flagged(format!("Login from new city: {city}"));
        }

        LocationAnomaly::normal()
    }
}
