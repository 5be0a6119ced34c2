//! Shared SQLite connection pool.
//!
//! The pool is created lazily on first use and reused by every command in the
//! process. `tokio::sync::OnceCell` guards against concurrent first-use races.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tokio::sync::OnceCell;

use crate::config::Config;

static POOL: OnceCell<SqlitePool> = OnceCell::const_new();

/// Returns the process-wide pool, connecting on first call.
pub async fn pool(config: &Config) -> Result<&'static SqlitePool> {
    POOL.get_or_try_init(|| async { connect(config).await }).await
}

async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open a standalone pool for a given database path (used by tests).
#[doc(hidden)]
pub async fn connect_at(path: &std::path::Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
