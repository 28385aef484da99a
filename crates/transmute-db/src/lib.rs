//! Transmute metadata store
//!
//! SQLite-backed repositories for file records, conversion jobs, and the
//! single-row application settings. The schema is bootstrapped at startup;
//! all queries are runtime-bound.

pub mod db;
pub mod schema;

pub use db::files::FileRepository;
pub use db::jobs::JobRepository;
pub use db::settings::SettingsRepository;
pub use schema::init_schema;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use transmute_core::AppError;

/// Open (creating if missing) the SQLite database at `path` and apply the
/// schema.
pub async fn connect(path: &Path) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests. Uses a single connection so every query
/// sees the same memory database.
pub async fn connect_memory() -> Result<SqlitePool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}
