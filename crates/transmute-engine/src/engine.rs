//! Conversion engine: submission, events, and lifecycle queries.
//!
//! `submit` is decoupled from execution: it validates, writes a pending job
//! row, and wakes the worker pool. Execution happens in [`crate::worker`].
//! Callers that want the original synchronous contract use
//! [`ConversionEngine::wait_for_terminal`] to await the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use transmute_convert::ConverterRegistry;
use transmute_core::models::{ConversionJob, ConversionParams, JobStatus};
use transmute_core::{AppError, Format};
use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_storage::Storage;

use crate::worker::{worker_pool, WorkerContext};

/// Terminal notification published when a job reaches complete or failed.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Concurrency ceiling for simultaneously running conversions.
    pub max_workers: usize,
    /// Fallback poll interval; submissions also wake the pool directly.
    pub poll_interval_ms: u64,
    /// Enforced per-job converter execution ceiling.
    pub job_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 500,
            job_timeout_secs: 300,
        }
    }
}

struct EngineInner {
    files: FileRepository,
    jobs: JobRepository,
    registry: Arc<ConverterRegistry>,
    events_tx: broadcast::Sender<JobEvent>,
    wake_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

/// The conversion job engine. Cheap to clone; all clones share one worker
/// pool.
#[derive(Clone)]
pub struct ConversionEngine {
    inner: Arc<EngineInner>,
}

impl ConversionEngine {
    /// Create the engine and spawn its worker pool.
    pub fn new(
        files: FileRepository,
        jobs: JobRepository,
        settings: SettingsRepository,
        storage: Arc<dyn Storage>,
        registry: Arc<ConverterRegistry>,
        config: EngineConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let (wake_tx, wake_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let context = WorkerContext {
            files: files.clone(),
            jobs: jobs.clone(),
            settings,
            storage,
            registry: registry.clone(),
            events_tx: events_tx.clone(),
            config: config.clone(),
        };

        tokio::spawn(worker_pool(context, wake_rx, shutdown_rx));

        Self {
            inner: Arc::new(EngineInner {
                files,
                jobs,
                registry,
                events_tx,
                wake_tx,
                shutdown_tx,
            }),
        }
    }

    /// Subscribe to terminal job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Validate a conversion request and enqueue it.
    ///
    /// Every validation failure surfaces before any state is mutated: no
    /// job row exists unless this returns Ok.
    #[tracing::instrument(skip(self, params))]
    pub async fn submit(
        &self,
        source_file_id: Uuid,
        input_format: Option<Format>,
        output_format: Format,
        params: ConversionParams,
    ) -> Result<Uuid, AppError> {
        let source = self
            .inner
            .files
            .get(source_file_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No file found with id {}", source_file_id))
            })?;

        let detected: Format = source.media_type.parse().map_err(|_| {
            AppError::Internal(format!(
                "File {} has unparseable media type {:?}",
                source.id, source.media_type
            ))
        })?;

        // A client-declared input format must match what we detected at
        // upload; a mismatch is an error, never silently "fixed".
        if let Some(declared) = input_format {
            if declared != detected {
                return Err(AppError::InvalidInput(format!(
                    "input_format {} does not match detected media type {}",
                    declared, detected
                )));
            }
        }

        if source.size_bytes == 0 {
            return Err(AppError::InvalidInput(
                "Source file is empty; nothing to convert".to_string(),
            ));
        }

        // Pass-through (identical formats) is always accepted; anything else
        // needs a registered converter before a job row is created.
        if detected != output_format
            && self
                .inner
                .registry
                .resolve(&detected, &output_format)
                .is_none()
        {
            return Err(AppError::UnsupportedFormat {
                input: detected.to_string(),
                output: output_format.to_string(),
            });
        }

        let job = ConversionJob {
            id: Uuid::new_v4(),
            source_file_id: source.id,
            output_file_id: None,
            status: JobStatus::Pending,
            progress: 0,
            input_format: detected.to_string(),
            output_format: output_format.to_string(),
            params,
            error: None,
            source_filename: source.original_filename.clone(),
            source_media_type: source.media_type.clone(),
            source_extension: source.extension.clone(),
            source_size_bytes: source.size_bytes,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        self.inner.jobs.create_pending(&job).await?;

        // Best effort: a full wake channel just means the pool is already
        // busy and will pick the job up on its next pass.
        let _ = self.inner.wake_tx.try_send(());

        tracing::info!(
            job_id = %job.id,
            source_file_id = %source.id,
            input_format = %job.input_format,
            output_format = %job.output_format,
            "Conversion job submitted"
        );

        Ok(job.id)
    }

    /// Wait until the job reaches a terminal state or `wait` elapses,
    /// returning the latest job row either way.
    pub async fn wait_for_terminal(
        &self,
        job_id: Uuid,
        wait: Duration,
    ) -> Result<ConversionJob, AppError> {
        let mut events = self.subscribe();
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let job = self
                .inner
                .jobs
                .get(job_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("No job found with id {}", job_id)))?;

            if job.status.is_terminal() {
                return Ok(job);
            }

            let Some(remaining) = deadline.checked_duration_since(tokio::time::Instant::now())
            else {
                return Ok(job);
            };

            // Event-driven with a polling backstop for lagged receivers.
            let tick = remaining.min(Duration::from_millis(250));
            tokio::select! {
                event = events.recv() => {
                    if let Ok(event) = event {
                        if event.job_id != job_id {
                            continue;
                        }
                    }
                }
                _ = tokio::time::sleep(tick) => {}
            }
        }
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<ConversionJob>, AppError> {
        self.inner.jobs.get(job_id).await
    }

    /// Compatible output formats for a given input, for upload responses.
    pub fn compatible_formats(&self, input: &Format) -> Vec<String> {
        self.inner
            .registry
            .compatible_outputs(input)
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    /// Signal the worker pool to stop claiming new jobs. In-flight jobs run
    /// to completion or timeout.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(()).await;
    }
}
