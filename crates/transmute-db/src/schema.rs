//! Schema bootstrap
//!
//! Tables are created at startup if absent, like the rest of the data tree.
//! The database is embedded and single-node, so there is no separate
//! migration pipeline; additive changes extend these statements.

use sqlx::SqlitePool;
use transmute_core::AppError;

pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id                TEXT PRIMARY KEY,
            kind              TEXT NOT NULL,
            storage_key       TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            media_type        TEXT NOT NULL,
            extension         TEXT NOT NULL,
            size_bytes        INTEGER NOT NULL,
            checksum          TEXT NOT NULL,
            created_at        TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversion_jobs (
            id                 TEXT PRIMARY KEY,
            source_file_id     TEXT NOT NULL,
            output_file_id     TEXT,
            status             TEXT NOT NULL,
            progress           INTEGER NOT NULL DEFAULT 0,
            input_format       TEXT NOT NULL,
            output_format      TEXT NOT NULL,
            params             TEXT NOT NULL DEFAULT '{}',
            error              TEXT,
            source_filename    TEXT NOT NULL,
            source_media_type  TEXT NOT NULL,
            source_extension   TEXT NOT NULL,
            source_size_bytes  INTEGER NOT NULL,
            created_at         TEXT NOT NULL,
            started_at         TEXT,
            finished_at        TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            id                  INTEGER PRIMARY KEY,
            theme               TEXT NOT NULL DEFAULT 'rubedo',
            auto_download       INTEGER NOT NULL DEFAULT 0,
            keep_originals      INTEGER NOT NULL DEFAULT 1,
            cleanup_ttl_minutes INTEGER NOT NULL DEFAULT 60
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_kind_created ON files (kind, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON conversion_jobs (status)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_source ON conversion_jobs (source_file_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
