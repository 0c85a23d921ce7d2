//! Embedded `SQLite` migrations.
//!
//! ```rust,ignore
//! use login_shield::sqlite::migrations;
//!
//! migrations::run(&pool).await?;
//! ```

use sqlx::{Executor, SqlitePool};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20261001000001_create_rate_limits_table",
        include_str!("../../migrations_sqlite/20261001000001_create_rate_limits_table.sql"),
    ),
    (
        "20261001000002_create_login_history_table",
        include_str!("../../migrations_sqlite/20261001000002_create_login_history_table.sql"),
    ),
];

/// Applies pending migrations, tracked in `_login_shield_migrations`.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _login_shield_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM _login_shield_migrations WHERE name = ?)",
        )
        .bind(*name)
        .fetch_one(pool)
        .await?;

        if applied {
            continue;
        }

        // one statement per execute; bundled files keep semicolons out of literals
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                pool.execute(trimmed).await?;
            }
        }

        sqlx::query("INSERT INTO _login_shield_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(pool)
            .await?;

        log::info!(target: "login_shield", "msg=\"migration applied\", name=\"{name}\"");
    }

    Ok(())
}
