//! Application initialization: database, storage, converters, engine,
//! background services, and the router.

pub mod routes;
pub mod server;
pub mod services;

use axum::Router;
use std::sync::Arc;

use transmute_core::Config;
use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_engine::{ConversionEngine, EngineConfig};
use transmute_services::CleanupService;
use transmute_storage::{LocalStorage, Storage};

use crate::state::AppState;

pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router), anyhow::Error> {
    config.ensure_directories()?;

    let pool = transmute_db::connect(&config.db_path).await?;

    let files = FileRepository::new(pool.clone());
    let jobs = JobRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool.clone());
    settings.seed_defaults().await?;

    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(config.storage_dir.clone()).await?);

    let registry = Arc::new(services::build_registry(&config));
    for descriptor in registry.descriptors() {
        tracing::info!(
            converter = descriptor.name,
            inputs = ?descriptor.inputs,
            "Converter available"
        );
    }

    let engine = ConversionEngine::new(
        files.clone(),
        jobs.clone(),
        settings.clone(),
        storage.clone(),
        registry.clone(),
        EngineConfig {
            max_workers: config.max_workers,
            poll_interval_ms: config.poll_interval_ms,
            job_timeout_secs: config.job_timeout_secs,
        },
    );

    let cleanup = Arc::new(CleanupService::new(
        files.clone(),
        jobs.clone(),
        settings.clone(),
        storage.clone(),
        config.cleanup_interval_secs,
    ));
    // Detached; the sweep loop lives for the life of the process.
    let _ = cleanup.start();

    let state = Arc::new(AppState {
        pool,
        files,
        jobs,
        settings,
        storage,
        registry,
        engine,
        config,
    });

    let router = routes::build_router(state.clone());

    Ok((state, router))
}
