//! Geo lookup for the caller's address.
//!
//! [`GeoLocator`] is the seam to whatever IP geolocation service is in use.
//! Enable the `http` feature for [`HttpGeoLocator`], an ipapi-compatible
//! client. Enable `mocks` for [`MockGeoLocator`].

#[cfg(feature = "http")]
mod http;
#[cfg(any(test, feature = "mocks"))]
mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::LookupFailure;

#[cfg(feature = "http")]
pub use http::HttpGeoLocator;
#[cfg(any(test, feature = "mocks"))]
pub use mock::MockGeoLocator;

/// Where a login attempt is coming from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoSignal {
    /// Address used to bucket rate-limit state.
    pub source_address: String,
    pub city: String,
    pub country: String,
    /// ISO 3166-1 alpha-2, upper case.
    pub country_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolves `address`, or the caller's own public address when `None`.
    async fn locate(&self, address: Option<&str>) -> Result<GeoSignal, LookupFailure>;
}

/// Wire shape of an ipapi-style JSON answer.
///
/// Error answers look like `{"error": true, "reason": "RateLimited"}`.
#[derive(Debug, Default, Deserialize)]
struct GeoLookupResponse {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

impl GeoLookupResponse {
    fn into_signal(self) -> Result<GeoSignal, LookupFailure> {
        if self.error {
            let reason = self.reason.unwrap_or_else(|| "unspecified".to_owned());
            return Err(LookupFailure::unavailable(format!(
                "geo service reported an error: {reason}"
            )));
        }

        let source_address = non_blank(self.ip)
            .ok_or_else(|| LookupFailure::malformed("geo response has no ip"))?;
        let country = non_blank(self.country_name)
            .ok_or_else(|| LookupFailure::malformed("geo response has no country_name"))?;
        let country_code = non_blank(self.country_code)
            .ok_or_else(|| LookupFailure::malformed("geo response has no country_code"))?
            .to_ascii_uppercase();

        Ok(GeoSignal {
            source_address,
            city: non_blank(self.city).unwrap_or_default(),
            country,
            country_code,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: non_blank(self.timezone),
        })
    }
}

impl GeoSignal {
    /// Parses an ipapi-style JSON body.
    pub fn from_json(body: &str) -> Result<Self, LookupFailure> {
        let response: GeoLookupResponse = serde_json::from_str(body)
            .map_err(|e| LookupFailure::malformed(format!("geo response is not valid JSON: {e}")))?;
        response.into_signal()
    }

    #[cfg(any(test, feature = "mocks"))]
    pub fn mock(country: &str, country_code: &str, city: &str) -> Self {
        Self {
            source_address: "203.0.113.10".to_owned(),
            city: city.to_owned(),
            country: country.to_owned(),
            country_code: country_code.to_owned(),
            latitude: None,
            longitude: None,
            timezone: None,
        }
    }

    #[cfg(any(test, feature = "mocks"))]
    #[must_use]
    pub fn at_address(mut self, source_address: &str) -> Self {
        source_address.clone_into(&mut self.source_address);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
