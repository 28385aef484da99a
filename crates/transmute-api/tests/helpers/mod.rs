//! Test helpers: build AppState and router for integration tests.
//!
//! Uses a temp-file SQLite database (so the pool can hold several
//! connections) and tempdir-backed local storage. The ffmpeg converter is
//! not registered; tests exercise the image and data adapters.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::TestServer;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use transmute_api::setup::routes;
use transmute_api::state::AppState;
use transmute_convert::{ConverterRegistry, DataConverter, ImageConverter};
use transmute_core::Config;
use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_engine::{ConversionEngine, EngineConfig};
use transmute_services::CleanupService;
use transmute_storage::{LocalStorage, Storage};

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub cleanup: CleanupService,
    pub _dir: TempDir,
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_origins: Vec::new(),
        environment: "test".to_string(),
        data_dir: dir.path().to_path_buf(),
        db_path: dir.path().join("test.db"),
        storage_dir: dir.path().join("storage"),
        max_upload_size_bytes: 32 * 1024 * 1024,
        ffmpeg_path: "ffmpeg".to_string(),
        ffmpeg_enabled: false,
        max_workers: 4,
        poll_interval_ms: 50,
        job_timeout_secs: 30,
        cleanup_interval_secs: 3600,
    }
}

pub async fn setup_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&dir);

    let pool = transmute_db::connect(&config.db_path)
        .await
        .expect("Failed to open test database");

    let files = FileRepository::new(pool.clone());
    let jobs = JobRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool.clone());
    settings.seed_defaults().await.expect("Failed to seed settings");

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(PathBuf::from(&config.storage_dir))
            .await
            .expect("Failed to create local storage"),
    );

    let mut registry = ConverterRegistry::new();
    registry.register(Arc::new(ImageConverter::new()));
    registry.register(Arc::new(DataConverter::new()));
    let registry = Arc::new(registry);

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

    let cleanup = CleanupService::new(
        files.clone(),
        jobs.clone(),
        settings.clone(),
        storage.clone(),
        config.cleanup_interval_secs,
    );

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

    let server = TestServer::new(routes::build_router(state.clone()))
        .expect("Failed to start test server");

    TestApp {
        server,
        state,
        cleanup,
        _dir: dir,
    }
}

/// Upload a fixture through the HTTP surface and return its metadata JSON.
pub async fn upload(app: &TestApp, filename: &str, mime: &str, data: Vec<u8>) -> serde_json::Value {
    use axum_test::multipart::{MultipartForm, Part};

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(data)
            .file_name(filename.to_string())
            .mime_type(mime.to_string()),
    );

    let response = app.server.post("/files").multipart(form).await;
    assert_eq!(response.status_code(), 200, "upload failed: {}", response.text());
    response.json::<serde_json::Value>()["metadata"].clone()
}
