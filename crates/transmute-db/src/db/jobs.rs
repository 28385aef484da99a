use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use transmute_core::models::{ConversionJob, FileRecord, JobError, JobStats, JobStatus};
use transmute_core::AppError;

/// Repository for conversion job rows.
///
/// Status transitions are enforced in SQL: claiming moves exactly one
/// pending row to running in a single statement, and terminal transitions
/// are guarded with `status = 'running'` so a job can never leave a
/// terminal state, no matter how calls interleave.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, job), fields(db.table = "conversion_jobs", job_id = %job.id))]
    pub async fn create_pending(&self, job: &ConversionJob) -> Result<(), AppError> {
        let params = serde_json::to_string(&job.params)?;

        sqlx::query(
            r#"
            INSERT INTO conversion_jobs (
                id, source_file_id, output_file_id, status, progress,
                input_format, output_format, params, error,
                source_filename, source_media_type, source_extension, source_size_bytes,
                created_at, started_at, finished_at
            )
            VALUES (?1, ?2, NULL, 'pending', 0, ?3, ?4, ?5, NULL, ?6, ?7, ?8, ?9, ?10, NULL, NULL)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.source_file_id.to_string())
        .bind(&job.input_format)
        .bind(&job.output_format)
        .bind(params)
        .bind(&job.source_filename)
        .bind(&job.source_media_type)
        .bind(&job.source_extension)
        .bind(job.source_size_bytes)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ConversionJob>, AppError> {
        let job = sqlx::query_as::<_, ConversionJob>("SELECT * FROM conversion_jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    pub async fn get_by_output(&self, output_file_id: Uuid) -> Result<Option<ConversionJob>, AppError> {
        let job = sqlx::query_as::<_, ConversionJob>(
            "SELECT * FROM conversion_jobs WHERE output_file_id = ?1",
        )
        .bind(output_file_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<ConversionJob>, AppError> {
        let jobs = match status {
            Some(status) => {
                sqlx::query_as::<_, ConversionJob>(
                    "SELECT * FROM conversion_jobs WHERE status = ?1 ORDER BY created_at DESC",
                )
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ConversionJob>(
                    "SELECT * FROM conversion_jobs ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(jobs)
    }

    /// Atomically claim the oldest pending job: pending -> running.
    ///
    /// A single UPDATE statement, so concurrent workers never claim the same
    /// job and readers never observe an intermediate state.
    pub async fn claim_next(&self) -> Result<Option<ConversionJob>, AppError> {
        let job = sqlx::query_as::<_, ConversionJob>(
            r#"
            UPDATE conversion_jobs
            SET status = 'running', started_at = ?1
            WHERE id = (
                SELECT id FROM conversion_jobs
                WHERE status = 'pending'
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Record success: insert the output file row and move the job
    /// running -> complete in one transaction. Either both are visible or
    /// neither is.
    #[tracing::instrument(skip(self, output), fields(db.table = "conversion_jobs"))]
    pub async fn complete_with_output(
        &self,
        job_id: Uuid,
        output: &FileRecord,
    ) -> Result<ConversionJob, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO files (
                id, kind, storage_key, original_filename, media_type,
                extension, size_bytes, checksum, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(output.id.to_string())
        .bind(output.kind.to_string())
        .bind(&output.storage_key)
        .bind(&output.original_filename)
        .bind(&output.media_type)
        .bind(&output.extension)
        .bind(output.size_bytes)
        .bind(&output.checksum)
        .bind(output.created_at)
        .execute(&mut *tx)
        .await?;

        let job = sqlx::query_as::<_, ConversionJob>(
            r#"
            UPDATE conversion_jobs
            SET status = 'complete', output_file_id = ?1, progress = 100, finished_at = ?2
            WHERE id = ?3 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(output.id.to_string())
        .bind(Utc::now())
        .bind(job_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!(
                "Job {} is not running; refusing to complete",
                job_id
            )));
        };

        tx.commit().await?;

        Ok(job)
    }

    /// Record failure: running -> failed with a structured error.
    #[tracing::instrument(skip(self, error), fields(db.table = "conversion_jobs"))]
    pub async fn mark_failed(&self, job_id: Uuid, error: &JobError) -> Result<(), AppError> {
        let payload = serde_json::to_string(error)?;

        let result = sqlx::query(
            r#"
            UPDATE conversion_jobs
            SET status = 'failed', error = ?1, finished_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(payload)
        .bind(Utc::now())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(job_id = %job_id, "mark_failed on a job that is not running");
        }

        Ok(())
    }

    /// Whether any pending or running job reads from the given source file.
    pub async fn has_active_for_source(&self, source_file_id: Uuid) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM conversion_jobs
            WHERE source_file_id = ?1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(source_file_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn jobs_for_source(&self, source_file_id: Uuid) -> Result<Vec<ConversionJob>, AppError> {
        let jobs = sqlx::query_as::<_, ConversionJob>(
            "SELECT * FROM conversion_jobs WHERE source_file_id = ?1",
        )
        .bind(source_file_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM conversion_jobs WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Prune finished jobs whose terminal timestamp predates `cutoff`.
    pub async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM conversion_jobs
            WHERE status IN ('complete', 'failed') AND finished_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Completed jobs paired with their output file records, newest first.
    pub async fn list_complete_with_outputs(
        &self,
        files: &super::files::FileRepository,
    ) -> Result<Vec<(ConversionJob, FileRecord)>, AppError> {
        let jobs = sqlx::query_as::<_, ConversionJob>(
            "SELECT * FROM conversion_jobs WHERE status = 'complete' ORDER BY finished_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let output_ids: Vec<Uuid> = jobs.iter().filter_map(|j| j.output_file_id).collect();
        let outputs = files.get_by_ids(&output_ids).await?;
        let by_id: std::collections::HashMap<Uuid, FileRecord> =
            outputs.into_iter().map(|f| (f.id, f)).collect();

        Ok(jobs
            .into_iter()
            .filter_map(|job| {
                let output = job.output_file_id.and_then(|id| by_id.get(&id).cloned())?;
                Some((job, output))
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<JobStats, AppError> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'running' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'complete' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
            FROM conversion_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(JobStats {
            total: row.0,
            pending: row.1,
            running: row.2,
            complete: row.3,
            failed: row.4,
        })
    }
}
