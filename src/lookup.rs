use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a collaborator lookup produced no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, non-success status, or backend error.
    Unavailable,
    /// The lookup did not finish within the configured timeout.
    Timeout,
    /// The collaborator answered but the payload was unusable.
    Malformed,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure half of the tagged result returned by geo and history lookups.
///
/// Callers decide per [`FailureKind`] how to degrade; nothing is swallowed
/// inside the collaborator itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl LookupFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, detail)
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for LookupFailure {}

/// Bounds `lookup` by `limit`, mapping an elapsed timer to [`FailureKind::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    limit: std::time::Duration,
    what: &str,
    lookup: F,
) -> Result<T, LookupFailure>
where
    F: std::future::Future<Output = Result<T, LookupFailure>>,
{
    match tokio::time::timeout(limit, lookup).await {
        Ok(result) => result,
        Err(_) => Err(LookupFailure::timeout(format!(
            "{what} did not answer within {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failure_display() {
        let failure = LookupFailure::malformed("missing country_code");
        assert_eq!(failure.to_string(), "malformed: missing country_code");
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through_result() {
        let result = with_timeout(Duration::from_secs(1), "geo lookup", async { Ok::<_, LookupFailure>(7) }).await;
        assert_eq!(result, Ok(7));

        let result: Result<u8, _> = with_timeout(Duration::from_secs(1), "geo lookup", async {
            Err(LookupFailure::unavailable("connection refused"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, FailureKind::Unavailable);
    }

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed_timer() {
        let result: Result<u8, _> = with_timeout(Duration::from_millis(10), "history lookup", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.detail.contains("history lookup"));
    }
}
