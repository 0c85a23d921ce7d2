#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{GeoLocator, GeoSignal};
use crate::{FailureKind, LookupFailure};

/// Geo locator with a canned answer.
#[derive(Clone)]
pub struct MockGeoLocator {
    pub answer: Arc<Mutex<Result<GeoSignal, LookupFailure>>>,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockGeoLocator {
    pub fn returning(signal: GeoSignal) -> Self {
        Self {
            answer: Arc::new(Mutex::new(Ok(signal))),
            delay: None,
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn failing(kind: FailureKind) -> Self {
        Self {
            answer: Arc::new(Mutex::new(Err(LookupFailure::new(kind, "mock geo failure")))),
            delay: None,
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_signal(&self, signal: GeoSignal) {
        *self.answer.lock().unwrap() = Ok(signal);
    }
}

#[async_trait]
impl GeoLocator for MockGeoLocator {
    async fn locate(&self, address: Option<&str>) -> Result<GeoSignal, LookupFailure> {
        self.calls.lock().unwrap().push(address.map(ToOwned::to_owned));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.answer.lock().unwrap().clone()
    }
}
