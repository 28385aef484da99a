//! TTL cleanup sweep
//!
//! Periodically deletes file records older than the configured retention
//! window, reclaims their payloads, prunes finished jobs, and runs the
//! storage orphan sweep. Individual-item failures are logged and never
//! abort the rest of the sweep.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_storage::Storage;

/// Extra slack on the storage orphan sweep so payloads whose rows are still
/// alive (e.g. sources of long-running jobs skipped below) are not removed
/// from under them.
const ORPHAN_SWEEP_GRACE_SECS: u64 = 3600;

/// What one sweep pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub files_deleted: usize,
    pub jobs_pruned: u64,
    pub payloads_swept: usize,
}

#[derive(Clone)]
pub struct CleanupService {
    files: FileRepository,
    jobs: JobRepository,
    settings: SettingsRepository,
    storage: Arc<dyn Storage>,
    interval_secs: u64,
}

impl CleanupService {
    pub fn new(
        files: FileRepository,
        jobs: JobRepository,
        settings: SettingsRepository,
        storage: Arc<dyn Storage>,
        interval_secs: u64,
    ) -> Self {
        Self {
            files,
            jobs,
            settings,
            storage,
            interval_secs,
        }
    }

    /// Start the background cleanup loop. Returns a JoinHandle for graceful
    /// shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(Duration::from_secs(self.interval_secs));
            cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                cleanup_interval.tick().await;

                match self.run_sweep_once().await {
                    Ok(outcome) => {
                        if outcome != SweepOutcome::default() {
                            tracing::info!(
                                files_deleted = outcome.files_deleted,
                                jobs_pruned = outcome.jobs_pruned,
                                payloads_swept = outcome.payloads_swept,
                                "Cleanup sweep completed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Cleanup sweep failed");
                    }
                }
            }
        })
    }

    /// One full sweep pass. The retention window is read from settings each
    /// time so PATCHed values take effect without a restart.
    #[tracing::instrument(skip(self))]
    pub async fn run_sweep_once(&self) -> Result<SweepOutcome, anyhow::Error> {
        let ttl_minutes = self.settings.get().await?.cleanup_ttl_minutes;
        let cutoff = Utc::now() - ChronoDuration::minutes(ttl_minutes);

        let mut outcome = SweepOutcome::default();

        let expired = self.files.get_expired(cutoff).await?;
        for file in expired {
            // Never pull a source out from under an in-flight job; the next
            // sweep gets it once the job is terminal.
            match self.jobs.has_active_for_source(file.id).await {
                Ok(true) => {
                    tracing::debug!(file_id = %file.id, "Skipping expired file with active job");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, file_id = %file.id, "Failed to check active jobs");
                    continue;
                }
            }

            if let Err(e) = self.storage.delete(&file.storage_key).await {
                tracing::error!(
                    error = %e,
                    storage_key = %file.storage_key,
                    "Failed to delete payload, continuing with record deletion"
                );
            }

            match self.files.delete(file.id).await {
                Ok(_) => {
                    outcome.files_deleted += 1;
                    tracing::debug!(file_id = %file.id, "Deleted expired file");
                }
                Err(e) => {
                    tracing::error!(error = %e, file_id = %file.id, "Failed to delete expired record");
                }
            }
        }

        match self.jobs.delete_finished_before(cutoff).await {
            Ok(pruned) => outcome.jobs_pruned = pruned,
            Err(e) => {
                tracing::error!(error = %e, "Failed to prune finished jobs");
            }
        }

        let orphan_ttl =
            Duration::from_secs(ttl_minutes.max(0) as u64 * 60 + ORPHAN_SWEEP_GRACE_SECS);
        match self.storage.sweep_older_than(orphan_ttl).await {
            Ok(swept) => outcome.payloads_swept = swept,
            Err(e) => {
                tracing::error!(error = %e, "Storage orphan sweep failed");
            }
        }

        Ok(outcome)
    }
}
