//! Conversion handlers: submission, completed listing, deletion.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use transmute_core::models::{ConversionParams, FileKind, JobStatus};
use transmute_core::{AppError, Format};
use transmute_storage::Storage;

use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::files::{BulkDeleteResponse, BulkItemError, FileMetadata, MessageResponse};
use crate::handlers::jobs::JobResponse;
use crate::state::AppState;

/// Extra slack on top of the job timeout before the handler stops waiting
/// and returns 202 with the job still in flight.
const WAIT_MARGIN_SECS: u64 = 10;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConversionRequest {
    /// Id of the uploaded file to convert.
    pub id: Uuid,
    /// Declared input format; must match the detected media type when set.
    #[serde(default)]
    pub input_format: Option<String>,
    /// Target format for the conversion.
    pub output_format: String,
    #[serde(default)]
    pub params: ConversionParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionResponse {
    pub job: JobResponse,
    pub metadata: FileMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SourceFileMetadata {
    pub id: Uuid,
    pub original_filename: String,
    pub media_type: String,
    pub extension: String,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionItem {
    pub id: Uuid,
    pub original_filename: String,
    pub media_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Snapshot of the source file's metadata, taken at submission time so
    /// it survives deletion of the source.
    pub original_file: SourceFileMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversionListResponse {
    pub conversions: Vec<ConversionItem>,
}

fn parse_format(raw: &str, field: &str) -> Result<Format, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid {}: {:?}", field, raw)))
}

/// Create a new conversion for a previously uploaded file.
///
/// The job is queued and executed by the worker pool; this handler waits for
/// the terminal state and returns the output metadata, falling back to 202 +
/// the job descriptor when the job outlives the wait window.
#[tracing::instrument(skip(state, request), fields(source_file_id = %request.id, output_format = %request.output_format))]
pub async fn create_conversion(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ConversionRequest>,
) -> Result<Response, HttpAppError> {
    let output_format = parse_format(&request.output_format, "output_format")?;
    let input_format = request
        .input_format
        .as_deref()
        .map(|raw| parse_format(raw, "input_format"))
        .transpose()?;

    let job_id = state
        .engine
        .submit(request.id, input_format, output_format, request.params)
        .await?;

    let wait = Duration::from_secs(state.config.job_timeout_secs + WAIT_MARGIN_SECS);
    let job = state.engine.wait_for_terminal(job_id, wait).await?;

    match job.status {
        JobStatus::Complete => {
            let output_id = job.output_file_id.ok_or_else(|| {
                AppError::Internal("Complete job has no output file".to_string())
            })?;
            let output = state.files.get(output_id).await?.ok_or_else(|| {
                AppError::Internal("Output record missing for complete job".to_string())
            })?;

            Ok(Json(ConversionResponse {
                job: JobResponse::from(job),
                metadata: FileMetadata::from(output),
            })
            .into_response())
        }
        JobStatus::Failed => {
            let error = job
                .error
                .map(|e| e.to_app_error())
                .unwrap_or_else(|| AppError::Internal("Job failed without an error".to_string()));
            Err(error.into())
        }
        // Still pending/running after the wait window: hand back the job so
        // the client can poll /jobs/{id}.
        _ => Ok((StatusCode::ACCEPTED, Json(JobResponse::from(job))).into_response()),
    }
}

/// List all completed conversions with their source file metadata joined.
pub async fn list_complete(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ConversionListResponse>, HttpAppError> {
    let complete = state.jobs.list_complete_with_outputs(&state.files).await?;

    let conversions = complete
        .into_iter()
        .map(|(job, output)| ConversionItem {
            id: output.id,
            original_filename: output.original_filename,
            media_type: output.media_type,
            extension: output.extension,
            size_bytes: output.size_bytes,
            checksum: output.checksum,
            created_at: output.created_at,
            original_file: SourceFileMetadata {
                id: job.source_file_id,
                original_filename: job.source_filename,
                media_type: job.source_media_type,
                extension: job.source_extension,
                size_bytes: job.source_size_bytes,
            },
        })
        .collect();

    Ok(Json(ConversionListResponse { conversions }))
}

/// Delete one conversion output (by output file id) and its job row.
async fn delete_conversion_output(state: &AppState, output_id: Uuid) -> Result<(), AppError> {
    let record = state
        .files
        .get(output_id)
        .await?
        .filter(|r| r.kind == FileKind::Conversion)
        .ok_or_else(|| AppError::NotFound("Conversion not found".to_string()))?;

    if let Err(e) = state.storage.delete(&record.storage_key).await {
        tracing::warn!(error = %e, key = %record.storage_key, "Failed to delete conversion payload");
    }
    state.files.delete(output_id).await?;

    if let Some(job) = state.jobs.get_by_output(output_id).await? {
        state.jobs.delete(job.id).await?;
    }

    tracing::info!(output_file_id = %output_id, "Conversion deleted");

    Ok(())
}

/// Delete a converted file and its linkage to the original.
pub async fn delete_conversion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    delete_conversion_output(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "Conversion deleted successfully".to_string(),
    }))
}

/// Delete all converted files. Per-item outcomes; failures do not abort the
/// remaining items.
pub async fn delete_all_conversions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BulkDeleteResponse>, HttpAppError> {
    let outputs = state.files.list(Some(FileKind::Conversion)).await?;

    let mut deleted = 0usize;
    let mut failed = Vec::new();
    for record in outputs {
        match delete_conversion_output(&state, record.id).await {
            Ok(()) => deleted += 1,
            Err(e) => failed.push(BulkItemError {
                id: record.id,
                error: e.to_string(),
            }),
        }
    }

    Ok(Json(BulkDeleteResponse { deleted, failed }))
}
