//! Database module
//!
//! SQLite via sqlx: runtime-checked queries, `?N` binds, i64 millisecond
//! timestamps, snowflake i64 ids. Schema is created idempotently at startup.

pub mod repository;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Whether a repository error is a SQLite write-conflict (busy/locked).
///
/// SQLite reports lock contention through the error message; callers treat
/// these as retryable and re-run the whole unit of work.
pub fn is_write_conflict(err: &RepoError) -> bool {
    match err {
        RepoError::Database(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("locked") || msg.contains("busy")
        }
        _ => false,
    }
}

/// Open the connection pool.
///
/// WAL journal keeps readers off the writer's lock; the busy timeout gives
/// short write bursts a chance to drain before a conflict surfaces.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
}
