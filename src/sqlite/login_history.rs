use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::history::{LoginHistoryRepository, LoginRecord, LoginStatus};
use crate::{LookupFailure, ShieldError};

/// `SQLite`-backed login history, stored in the `login_history` table.
#[derive(Clone)]
pub struct SqliteLoginHistoryRepository {
    pool: SqlitePool,
}

impl SqliteLoginHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Deletes records older than `before`. Returns how many were removed.
    pub async fn prune_before(&self, before: DateTime<Utc>) -> Result<u64, ShieldError> {
        let result = sqlx::query("DELETE FROM login_history WHERE recorded_at < ?")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                log::error!(target: "login_shield", "msg=\"database error\", operation=\"prune_login_history\", error=\"{e}\"");
                ShieldError::DatabaseError(e.to_string())
            })?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    identity: String,
    status: String,
    country: Option<String>,
    city: Option<String>,
    ip_address: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<LoginRow> for LoginRecord {
    type Error = LookupFailure;

    fn try_from(row: LoginRow) -> Result<Self, Self::Error> {
        Ok(Self {
            identity: row.identity,
            status: row.status.parse()?,
            country: row.country,
            city: row.city,
            ip_address: row.ip_address,
            recorded_at: row.recorded_at,
        })
    }
}

#[async_trait]
impl LoginHistoryRepository for SqliteLoginHistoryRepository {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn recent_logins(
        &self,
        identity: &str,
        status: LoginStatus,
        limit: usize,
    ) -> Result<Vec<LoginRecord>, LookupFailure> {
        let rows: Vec<LoginRow> = sqlx::query_as(
            r"
            SELECT identity, status, country, city, ip_address, recorded_at
            FROM login_history
            WHERE identity = ? AND status = ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(identity)
        .bind(status.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            log::error!(target: "login_shield", "msg=\"database error\", operation=\"recent_logins\", error=\"{e}\"");
            LookupFailure::unavailable(e.to_string())
        })?;

        // unreadable rows count as absent history
        Ok(rows
            .into_iter()
            .filter_map(|row| match LoginRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(failure) => {
                    log::warn!(target: "login_shield", "msg=\"skipping malformed login row\", error=\"{}\"", failure.detail);
                    None
                }
            })
            .collect())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, record), err))]
    async fn record_login(&self, record: &LoginRecord) -> Result<(), ShieldError> {
        sqlx::query(
            r"
            INSERT INTO login_history (identity, status, country, city, ip_address, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&record.identity)
        .bind(record.status.as_str())
        .bind(&record.country)
        .bind(&record.city)
        .bind(&record.ip_address)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            log::error!(target: "login_shield", "msg=\"database error\", operation=\"record_login\", error=\"{e}\"");
            ShieldError::DatabaseError(e.to_string())
        })?;

        Ok(())
    }
}
