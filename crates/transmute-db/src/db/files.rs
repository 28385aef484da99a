use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use transmute_core::models::{FileKind, FileRecord};
use transmute_core::AppError;

/// Repository for file metadata rows (uploads and conversion outputs).
///
/// Writes are atomic per record. The byte payload referenced by
/// `storage_key` is owned by the file store; callers coordinate deletion of
/// both sides so they never diverge.
#[derive(Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", file_id = %record.id))]
    pub async fn create(&self, record: &FileRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, kind, storage_key, original_filename, media_type,
                extension, size_bytes, checksum, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.kind.to_string())
        .bind(&record.storage_key)
        .bind(&record.original_filename)
        .bind(&record.media_type)
        .bind(&record.extension)
        .bind(record.size_bytes)
        .bind(&record.checksum)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Fetch multiple records in one query (avoids N+1 in listings).
    pub async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<FileRecord>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT * FROM files WHERE id IN ({})", placeholders);

        let mut query = sqlx::query_as::<_, FileRecord>(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn list(&self, kind: Option<FileKind>) -> Result<Vec<FileRecord>, AppError> {
        let records = match kind {
            Some(kind) => {
                sqlx::query_as::<_, FileRecord>(
                    "SELECT * FROM files WHERE kind = ?1 ORDER BY created_at DESC",
                )
                .bind(kind.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, FileRecord>("SELECT * FROM files ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(records)
    }

    /// Uploaded files that have no completed conversion yet.
    pub async fn list_unconverted(&self) -> Result<Vec<FileRecord>, AppError> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT * FROM files
            WHERE kind = 'upload'
              AND id NOT IN (
                  SELECT source_file_id FROM conversion_jobs WHERE status = 'complete'
              )
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Delete a set of rows in one statement. Returns how many existed.
    #[tracing::instrument(skip(self, ids), fields(db.table = "files"))]
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("DELETE FROM files WHERE id IN ({})", placeholders);

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    /// Delete a row by id. Returns false when the id was absent.
    #[tracing::instrument(skip(self), fields(db.table = "files"))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records created before `cutoff`, oldest first. Used by the TTL sweep.
    pub async fn get_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<FileRecord>, AppError> {
        let records = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE created_at < ?1 ORDER BY created_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
