//! Job read API: status, progress, and error surfacing.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use transmute_core::models::{ConversionJob, JobError, JobStats, JobStatus};
use transmute_core::AppError;

use crate::error::HttpAppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: i32,
    pub input_format: String,
    pub output_format: String,
    pub source_file_id: Uuid,
    pub output_file_id: Option<Uuid>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<ConversionJob> for JobResponse {
    fn from(job: ConversionJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            progress: job.progress,
            input_format: job.input_format,
            output_format: job.output_format,
            source_file_id: job.source_file_id,
            output_file_id: job.output_file_id,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub count: usize,
}

/// List jobs, optionally filtered by status.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<JobListResponse>, HttpAppError> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            raw.parse::<JobStatus>()
                .map_err(|e| AppError::InvalidInput(e.to_string()))
        })
        .transpose()?;

    let jobs = state.jobs.list(status).await?;
    let jobs: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
    let count = jobs.len();

    Ok(Json(JobListResponse { jobs, count }))
}

/// Get one job by id.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, HttpAppError> {
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    Ok(Json(JobResponse::from(job)))
}

/// Aggregated job counts.
pub async fn job_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobStats>, HttpAppError> {
    let stats = state.jobs.stats().await?;
    Ok(Json(stats))
}
