#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LoginHistoryRepository, LoginRecord, LoginStatus};
use crate::{FailureKind, LookupFailure, ShieldError};

/// In-memory login history. Records are kept in insertion order, oldest first.
#[derive(Clone)]
pub struct MockLoginHistoryRepository {
    pub records: Arc<Mutex<Vec<LoginRecord>>>,
    pub fail_with: Arc<Mutex<Option<FailureKind>>>,
    pub write_failure: Arc<Mutex<bool>>,
}

impl MockLoginHistoryRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(vec![])),
            fail_with: Arc::new(Mutex::new(None)),
            write_failure: Arc::new(Mutex::new(false)),
        }
    }

    /// Seeds `count` successful logins from `country` / `city`.
    #[must_use]
    pub fn with_logins(self, identity: &str, country: &str, city: &str, count: usize) -> Self {
        {
            let mut records = self.records.lock().unwrap();
            for _ in 0..count {
                records.push(LoginRecord::mock_success(identity, country, city));
            }
        }
        self
    }

    /// Makes every read fail with `kind`.
    pub fn fail_reads(&self, kind: FailureKind) {
        *self.fail_with.lock().unwrap() = Some(kind);
    }

    /// Makes every write fail with a database error.
    pub fn fail_writes(&self) {
        *self.write_failure.lock().unwrap() = true;
    }
}

impl Default for MockLoginHistoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoginHistoryRepository for MockLoginHistoryRepository {
    async fn recent_logins(
        &self,
        identity: &str,
        status: LoginStatus,
        limit: usize,
    ) -> Result<Vec<LoginRecord>, LookupFailure> {
        if let Some(kind) = *self.fail_with.lock().unwrap() {
            return Err(LookupFailure::new(kind, "mock history failure"));
        }

        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.identity == identity && r.status == status)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_login(&self, record: &LoginRecord) -> Result<(), ShieldError> {
        if *self.write_failure.lock().unwrap() {
            return Err(ShieldError::DatabaseError("mock history write failure".to_owned()));
        }
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        drop(records);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recent_logins_most_recent_first_and_limited() {
        let repo = MockLoginHistoryRepository::new()
            .with_logins("a@example.com", "India", "Mumbai", 3)
            .with_logins("a@example.com", "India", "Pune", 2)
            .with_logins("b@example.com", "France", "Paris", 4);

        let recent = repo
            .recent_logins("a@example.com", LoginStatus::Success, 3)
            .await
            .unwrap();

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].city.as_deref(), Some("Pune"));
        assert_eq!(recent[2].city.as_deref(), Some("Mumbai"));
    }

    #[tokio::test]
    async fn test_recent_logins_filters_status() {
        let repo = MockLoginHistoryRepository::new();
        let mut failed = LoginRecord::mock_success("a@example.com", "India", "Mumbai");
        failed.status = LoginStatus::Failed;
        repo.record_login(&failed).await.unwrap();

        let success = repo
            .recent_logins("a@example.com", LoginStatus::Success, 50)
            .await
            .unwrap();
        assert!(success.is_empty());
    }

    #[tokio::test]
    async fn test_fail_reads() {
        let repo = MockLoginHistoryRepository::new();
        repo.fail_reads(FailureKind::Unavailable);

        let failure = repo
            .recent_logins("a@example.com", LoginStatus::Success, 50)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Unavailable);
    }
}
