use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Conversion job lifecycle state.
///
/// Transitions are monotonic: pending -> running -> {complete | failed}.
/// There is no transition out of a terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Failure classification recorded on a failed job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    UnsupportedFormat,
    CorruptInput,
    ConverterCrashed,
    Timeout,
    StorageFailure,
}

/// Structured error stored in a failed job's `error` column and surfaced via
/// the job read API. Mid-job failures land here, never as a live error to an
/// unrelated caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Map the stored failure back onto the API error taxonomy.
    pub fn to_app_error(&self) -> AppError {
        match self.kind {
            JobErrorKind::UnsupportedFormat => AppError::ConverterCrashed(self.message.clone()),
            JobErrorKind::CorruptInput => AppError::CorruptInput(self.message.clone()),
            JobErrorKind::ConverterCrashed => AppError::ConverterCrashed(self.message.clone()),
            JobErrorKind::Timeout => AppError::ConversionTimeout(self.message.clone()),
            JobErrorKind::StorageFailure => AppError::Storage(self.message.clone()),
        }
    }
}

/// Output quality hint for lossy targets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

/// Converter-specific options carried on a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

/// One conversion attempt: the output -> source relationship plus job
/// bookkeeping.
///
/// The source metadata snapshot is denormalized onto the job row so the
/// completed-conversions listing never dangles when the source record is
/// later deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: Uuid,
    pub source_file_id: Uuid,
    /// Set exactly once, on successful completion.
    pub output_file_id: Option<Uuid>,
    pub status: JobStatus,
    pub progress: i32,
    pub input_format: String,
    pub output_format: String,
    pub params: ConversionParams,
    pub error: Option<JobError>,
    pub source_filename: String,
    pub source_media_type: String,
    pub source_extension: String,
    pub source_size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for ConversionJob {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let params: ConversionParams = serde_json::from_str(row.get::<String, _>("params").as_str())
            .map_err(|e| sqlx::Error::Decode(format!("Failed to parse params: {}", e).into()))?;
        let error = row
            .get::<Option<String>, _>("error")
            .map(|raw| {
                serde_json::from_str::<JobError>(&raw).map_err(|e| {
                    sqlx::Error::Decode(format!("Failed to parse job error: {}", e).into())
                })
            })
            .transpose()?;

        Ok(ConversionJob {
            id: row
                .get::<String, _>("id")
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse job id: {}", e).into()))?,
            source_file_id: row.get::<String, _>("source_file_id").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse source_file_id: {}", e).into())
            })?,
            output_file_id: row
                .get::<Option<String>, _>("output_file_id")
                .map(|raw| {
                    raw.parse().map_err(|e| {
                        sqlx::Error::Decode(format!("Failed to parse output_file_id: {}", e).into())
                    })
                })
                .transpose()?,
            status: row
                .get::<String, _>("status")
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse status: {}", e).into()))?,
            progress: row.get("progress"),
            input_format: row.get("input_format"),
            output_format: row.get("output_format"),
            params,
            error,
            source_filename: row.get("source_filename"),
            source_media_type: row.get("source_media_type"),
            source_extension: row.get("source_extension"),
            source_size_bytes: row.get("source_size_bytes"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        })
    }
}

/// Aggregated job counts for the stats endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub running: i64,
    pub complete: i64,
    pub failed: i64,
}
