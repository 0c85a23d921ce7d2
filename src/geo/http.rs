use async_trait::async_trait;

use super::{GeoLocator, GeoLookupResponse, GeoSignal};
use crate::{LookupFailure, ShieldError};

const DEFAULT_BASE_URL: &str = "https://ipapi.co";

/// Geo locator for ipapi-compatible services.
///
/// Requests `{base}/json/` for the caller's own address and
/// `{base}/{address}/json/` when an address is supplied.
///
/// Requires the `http` feature.
#[derive(Debug, Clone)]
pub struct HttpGeoLocator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeoLocator {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_BASE_URL)
    }

    /// Builds a locator whose HTTP client gives up after `timeout`.
    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ShieldError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShieldError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, DEFAULT_BASE_URL))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn url_for(&self, address: Option<&str>) -> String {
        match address.map(str::trim).filter(|a| !a.is_empty()) {
            Some(address) => format!("{}/{address}/json/", self.base_url),
            None => format!("{}/json/", self.base_url),
        }
    }
}

impl Default for HttpGeoLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "geo_lookup", skip_all, err))]
    async fn locate(&self, address: Option<&str>) -> Result<GeoSignal, LookupFailure> {
        let url = self.url_for(address);

        let response = self.client.get(&url).send().await.map_err(|e| {
            log::warn!(target: "login_shield", "msg=\"geo lookup request failed\", error=\"{e}\"");
            classify(&e)
        })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!(target: "login_shield", "msg=\"geo lookup rejected\", status={status}");
            return Err(LookupFailure::unavailable(format!("geo service returned {status}")));
        }

        let body: GeoLookupResponse = response.json().await.map_err(|e| {
            log::warn!(target: "login_shield", "msg=\"geo lookup body unreadable\", error=\"{e}\"");
            classify(&e)
        })?;

        body.into_signal()
    }
}

fn classify(error: &reqwest::Error) -> LookupFailure {
    if error.is_timeout() {
        LookupFailure::timeout(error.to_string())
    } else if error.is_decode() {
        LookupFailure::malformed(error.to_string())
    } else {
        LookupFailure::unavailable(error.to_string())
    }
}
