//! `SQLite` storage backends.
//!
//! Enable the `sqlx_sqlite` feature to use these implementations. Run
//! [`migrations::run`] once against the pool before using them.

mod login_history;
pub mod migrations;
mod rate_limit_store;

pub use login_history::SqliteLoginHistoryRepository;
pub use rate_limit_store::SqliteRateLimitStore;
use sqlx::SqlitePool;

/// Creates both `SQLite` stores from one connection pool.
pub fn create_stores(pool: SqlitePool) -> (SqliteRateLimitStore, SqliteLoginHistoryRepository) {
    (
        SqliteRateLimitStore::new(pool.clone()),
        SqliteLoginHistoryRepository::new(pool),
    )
}
