use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::ShieldError;
use crate::clock::{Clock, SystemClock};
use crate::rate_limit::{AttemptRecord, RateLimitStore};

/// `SQLite`-backed rate limit store.
///
/// Lets several processes sharing one database file see the same attempt
/// counts. Rows past their `expires_at` are ignored on read and removed by
/// [`cleanup_expired`](Self::cleanup_expired).
///
/// # Table Schema
///
/// ```sql
/// CREATE TABLE rate_limits (
///     key TEXT PRIMARY KEY,
///     source_key TEXT NOT NULL,
///     attempts INTEGER NOT NULL DEFAULT 1,
///     window_started_at TEXT NOT NULL,
///     expires_at TEXT NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct SqliteRateLimitStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteRateLimitStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    /// Expiry is computed and compared against `clock` instead of wall time.
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Deletes expired rows. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64, ShieldError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at < ?")
            .bind(self.clock.now())
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("cleanup_expired_rate_limits", &e))?;

        Ok(result.rows_affected())
    }
}

fn database_error(operation: &str, e: &sqlx::Error) -> ShieldError {
    log::error!(target: "login_shield", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    ShieldError::DatabaseError(e.to_string())
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    source_key: String,
    attempts: i64,
    window_started_at: DateTime<Utc>,
}

impl From<AttemptRow> for AttemptRecord {
    fn from(row: AttemptRow) -> Self {
        Self {
            source_key: row.source_key,
            count: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            window_started_at: row.window_started_at,
        }
    }
}

#[async_trait]
impl RateLimitStore for SqliteRateLimitStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, ShieldError> {
        let row: Option<AttemptRow> = sqlx::query_as(
            "SELECT source_key, attempts, window_started_at FROM rate_limits WHERE key = ? AND expires_at >= ?",
        )
        .bind(key)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("rate_limit_get", &e))?;

        Ok(row.map(AttemptRecord::from))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, record), err))]
    async fn set(&self, key: &str, record: &AttemptRecord, ttl: Duration) -> Result<(), ShieldError> {
        let expires_at = self.clock.now() + ttl;

        sqlx::query(
            r"
            INSERT INTO rate_limits (key, source_key, attempts, window_started_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (key) DO UPDATE SET
                source_key = excluded.source_key,
                attempts = excluded.attempts,
                window_started_at = excluded.window_started_at,
                expires_at = excluded.expires_at
            ",
        )
        .bind(key)
        .bind(&record.source_key)
        .bind(i64::from(record.count))
        .bind(record.window_started_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("rate_limit_set", &e))?;

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete(&self, key: &str) -> Result<(), ShieldError> {
        sqlx::query("DELETE FROM rate_limits WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| database_error("rate_limit_delete", &e))?;

        Ok(())
    }
}
