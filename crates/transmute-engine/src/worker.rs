//! Worker pool: claims pending jobs and runs conversions to a terminal
//! state.
//!
//! Concurrency is bounded by a semaphore. Each claimed job runs under an
//! enforced timeout; the converter invocation is scoped so temp resources
//! and child processes are reclaimed on every exit path, including timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use transmute_convert::{ConvertError, ConvertRequest, ConverterRegistry};
use transmute_core::models::{
    ConversionJob, FileKind, FileRecord, JobError, JobErrorKind, JobStatus,
};
use transmute_core::Format;
use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_storage::{keys, Storage};

use crate::engine::{EngineConfig, JobEvent};

/// Everything a worker needs to execute a claimed job.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub files: FileRepository,
    pub jobs: JobRepository,
    pub settings: SettingsRepository,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<ConverterRegistry>,
    pub events_tx: broadcast::Sender<JobEvent>,
    pub config: EngineConfig,
}

pub(crate) async fn worker_pool(
    context: WorkerContext,
    mut wake_rx: mpsc::Receiver<()>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    tracing::info!(
        max_workers = context.config.max_workers,
        poll_interval_ms = context.config.poll_interval_ms,
        "Conversion worker pool started"
    );

    let semaphore = Arc::new(Semaphore::new(context.config.max_workers));
    let poll_interval = Duration::from_millis(context.config.poll_interval_ms);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Conversion worker pool shutting down");
                break;
            }
            _ = wake_rx.recv() => {
                claim_and_dispatch(&context, &semaphore).await;
            }
            _ = sleep(poll_interval) => {
                claim_and_dispatch(&context, &semaphore).await;
            }
        }
    }

    tracing::info!("Conversion worker pool stopped");
}

/// Claim as many pending jobs as free workers allow, spawning one task per
/// claim. Unrelated jobs never serialize behind one slow conversion.
async fn claim_and_dispatch(context: &WorkerContext, semaphore: &Arc<Semaphore>) {
    loop {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match context.jobs.claim_next().await {
            Ok(Some(job)) => {
                let context = context.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_claimed(context, job).await;
                });
            }
            Ok(None) => {
                drop(permit);
                return;
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim conversion job");
                return;
            }
        }
    }
}

/// Drive one claimed (running) job to a terminal state.
#[tracing::instrument(skip(context, job), fields(job_id = %job.id, output_format = %job.output_format))]
async fn run_claimed(context: WorkerContext, job: ConversionJob) {
    let timeout = Duration::from_secs(context.config.job_timeout_secs);

    let status = match tokio::time::timeout(timeout, perform(&context, &job)).await {
        Ok(Ok(output_id)) => {
            tracing::info!(output_file_id = %output_id, "Conversion job completed");
            JobStatus::Complete
        }
        Ok(Err(job_error)) => {
            tracing::warn!(
                kind = ?job_error.kind,
                message = %job_error.message,
                "Conversion job failed"
            );
            if let Err(e) = context.jobs.mark_failed(job.id, &job_error).await {
                tracing::error!(error = %e, "Failed to record job failure");
            }
            JobStatus::Failed
        }
        Err(_) => {
            // Dropping the perform future kills converter child processes
            // (kill-on-drop) and releases staged temp files.
            let job_error = JobError::new(
                JobErrorKind::Timeout,
                format!("Conversion exceeded {}s limit", context.config.job_timeout_secs),
            );
            tracing::warn!(timeout_secs = context.config.job_timeout_secs, "Conversion job timed out");
            if let Err(e) = context.jobs.mark_failed(job.id, &job_error).await {
                tracing::error!(error = %e, "Failed to record job timeout");
            }
            JobStatus::Failed
        }
    };

    let _ = context.events_tx.send(JobEvent {
        job_id: job.id,
        status,
    });
}

fn map_convert_error(err: ConvertError) -> JobError {
    match err {
        ConvertError::Unsupported { .. } => {
            JobError::new(JobErrorKind::UnsupportedFormat, err.to_string())
        }
        ConvertError::CorruptInput(msg) => JobError::new(JobErrorKind::CorruptInput, msg),
        ConvertError::Failed(msg) => JobError::new(JobErrorKind::ConverterCrashed, msg),
        ConvertError::Io(e) => JobError::new(JobErrorKind::ConverterCrashed, e.to_string()),
    }
}

/// Execute the conversion and commit the output. Returns the output file id.
///
/// Success is atomic from a reader's perspective: the payload is stored
/// first, then the output row and the complete transition commit together;
/// if that commit fails the payload is deleted again.
async fn perform(context: &WorkerContext, job: &ConversionJob) -> Result<Uuid, JobError> {
    let source = context
        .files
        .get(job.source_file_id)
        .await
        .map_err(|e| JobError::new(JobErrorKind::StorageFailure, e.to_string()))?
        .ok_or_else(|| {
            JobError::new(
                JobErrorKind::StorageFailure,
                format!("Source file {} no longer exists", job.source_file_id),
            )
        })?;

    let data = context
        .storage
        .get(&source.storage_key)
        .await
        .map_err(|e| JobError::new(JobErrorKind::StorageFailure, e.to_string()))?;

    if data.is_empty() {
        return Err(JobError::new(
            JobErrorKind::CorruptInput,
            "Source payload is empty",
        ));
    }

    let input: Format = job
        .input_format
        .parse()
        .map_err(|_| JobError::new(JobErrorKind::CorruptInput, "Unparseable input format"))?;
    let output: Format = job
        .output_format
        .parse()
        .map_err(|_| JobError::new(JobErrorKind::CorruptInput, "Unparseable output format"))?;

    let output_bytes = if input == output {
        // Pass-through: same format, but still a distinct record and payload.
        data.clone()
    } else {
        let converter = context.registry.resolve(&input, &output).ok_or_else(|| {
            JobError::new(
                JobErrorKind::UnsupportedFormat,
                format!("No converter registered for {} to {}", input, output),
            )
        })?;

        let request = ConvertRequest {
            input,
            output: output.clone(),
            params: job.params.clone(),
        };

        converter
            .convert(&data, &request)
            .await
            .map_err(map_convert_error)?
    };

    // A converter that "succeeds" with nothing to show for it did not succeed.
    if output_bytes.is_empty() {
        return Err(JobError::new(
            JobErrorKind::ConverterCrashed,
            "Converter reported success but produced empty output",
        ));
    }

    let output_id = Uuid::new_v4();
    let storage_key = keys::conversion_key(&format!("{}{}", output_id, output.dotted_extension()));
    let checksum = hex::encode(Sha256::digest(&output_bytes));
    let size_bytes = output_bytes.len() as i64;

    context
        .storage
        .put(&storage_key, output_bytes)
        .await
        .map_err(|e| JobError::new(JobErrorKind::StorageFailure, e.to_string()))?;

    let record = FileRecord {
        id: output_id,
        kind: FileKind::Conversion,
        storage_key: storage_key.clone(),
        original_filename: job.source_filename.clone(),
        media_type: output.to_string(),
        extension: output.dotted_extension(),
        size_bytes,
        checksum,
        created_at: Utc::now(),
    };

    if let Err(e) = context.jobs.complete_with_output(job.id, &record).await {
        // Roll the payload back so no orphaned bytes outlive the failure.
        if let Err(del) = context.storage.delete(&storage_key).await {
            tracing::error!(error = %del, key = %storage_key, "Failed to roll back output payload");
        }
        return Err(JobError::new(
            JobErrorKind::StorageFailure,
            format!("Failed to record output: {}", e),
        ));
    }

    apply_retention_policy(context, &source).await;

    Ok(output_id)
}

/// Success-path policy hook: when keep_originals is off, the source record
/// and payload are removed once the output is committed.
async fn apply_retention_policy(context: &WorkerContext, source: &FileRecord) {
    let settings = match context.settings.get().await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Could not load settings; keeping original");
            return;
        }
    };

    if settings.keep_originals {
        return;
    }

    if let Err(e) = context.storage.delete(&source.storage_key).await {
        tracing::warn!(error = %e, file_id = %source.id, "Failed to delete original payload");
        return;
    }
    match context.files.delete(source.id).await {
        Ok(_) => {
            tracing::info!(file_id = %source.id, "Deleted original after conversion (keep_originals=false)");
        }
        Err(e) => {
            tracing::warn!(error = %e, file_id = %source.id, "Failed to delete original record");
        }
    }
}
