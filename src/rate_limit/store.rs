use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ShieldError;
use crate::clock::{Clock, SystemClock};

/// Attempt counter for one source key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub source_key: String,
    pub count: u32,
    pub window_started_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// First attempt of a new window.
    pub fn start(source_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            source_key: source_key.into(),
            count: 1,
            window_started_at: now,
        }
    }

    /// A window is over once strictly more than `window` has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.window_started_at > window
    }

    pub fn window_ends_at(&self, window: Duration) -> DateTime<Utc> {
        self.window_started_at + window
    }
}

/// Key-value storage for attempt records.
///
/// The TTL passed to [`set`](Self::set) is how long the backend must keep the
/// record, up to and including `now + ttl`; after that it may drop it. A
/// zero TTL keeps the record for the current instant. Implement this for a shared cache or
/// database when several processes evaluate logins.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, ShieldError>;

    async fn set(&self, key: &str, record: &AttemptRecord, ttl: Duration) -> Result<(), ShieldError>;

    async fn delete(&self, key: &str) -> Result<(), ShieldError>;
}

#[derive(Debug, Clone)]
struct Entry {
    record: AttemptRecord,
    expires_at: DateTime<Utc>,
}

/// Process-local store. State is lost on restart and not shared between
/// instances; use a shared backend for multi-instance deployments.
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// call periodically in long-running applications to prevent memory growth
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        self.entries.write().map_or(0, |mut entries| {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at >= now);
            before - entries.len()
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, ShieldError> {
        let now = self.clock.now();
        let entries = self
            .entries
            .read()
            .map_err(|_| ShieldError::StoreError("Failed to acquire lock".to_owned()))?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at >= now)
            .map(|entry| entry.record.clone()))
    }

    async fn set(&self, key: &str, record: &AttemptRecord, ttl: Duration) -> Result<(), ShieldError> {
        let expires_at = self.clock.now() + ttl;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ShieldError::StoreError("Failed to acquire lock".to_owned()))?;

        entries.insert(
            key.to_owned(),
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        drop(entries);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ShieldError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ShieldError::StoreError("Failed to acquire lock".to_owned()))?;

        entries.remove(key);
        drop(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    #[test]
    fn test_record_window_boundaries() {
        let now = Utc::now();
        let record = AttemptRecord::start("1.2.3.4", now);
        let window = Duration::minutes(15);

        assert_eq!(record.count, 1);
        assert!(!record.is_expired(now + Duration::minutes(15), window));
        assert!(record.is_expired(now + Duration::minutes(15) + Duration::seconds(1), window));
        assert_eq!(record.window_ends_at(window), now + window);
    }

    #[tokio::test]
    async fn test_in_memory_store_set_get() {
        let store = InMemoryStore::new();

        // Key doesn't exist
        assert!(store.get("missing").await.unwrap().is_none());

        let record = AttemptRecord::start("1.2.3.4", Utc::now());
        store.set("login:1.2.3.4", &record, Duration::minutes(15)).await.unwrap();

        let stored = store.get("login:1.2.3.4").await.unwrap();
        assert_eq!(stored, Some(record));
    }

    #[tokio::test]
    async fn test_in_memory_store_delete() {
        let store = InMemoryStore::new();
        let record = AttemptRecord::start("1.2.3.4", Utc::now());
        store.set("k", &record, Duration::minutes(15)).await.unwrap();

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // deleting a missing key is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_store_ttl() {
        let clock = MockClock::default();
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let record = AttemptRecord::start("1.2.3.4", clock.now());
        store.set("k", &record, Duration::minutes(15)).await.unwrap();

        clock.advance(Duration::minutes(14));
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(Duration::minutes(2));
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let clock = MockClock::default();
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let now = clock.now();

        store.set("short", &AttemptRecord::start("a", now), Duration::minutes(1)).await.unwrap();
        store.set("long", &AttemptRecord::start("b", now), Duration::minutes(30)).await.unwrap();
        assert_eq!(store.len(), 2);

        clock.advance(Duration::minutes(5));
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_entry_lives_through_its_expiry_instant() {
        let clock = MockClock::default();
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let record = AttemptRecord::start("1.2.3.4", clock.now());
        let window = Duration::minutes(15);
        store.set("k", &record, window).await.unwrap();

        // same boundary as AttemptRecord::is_expired
        clock.advance(window);
        assert!(!record.is_expired(clock.now(), window));
        assert!(store.get("k").await.unwrap().is_some());
        assert_eq!(store.cleanup_expired(), 0);

        clock.advance(Duration::seconds(1));
        assert!(record.is_expired(clock.now(), window));
        assert!(store.get("k").await.unwrap().is_none());
    }
}
