//! Configuration module
//!
//! Values are loaded from environment variables (with `.env` support via
//! dotenvy) and fall back to defaults suitable for a single-node
//! self-hosted deployment.

use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3313;
const DEFAULT_MAX_UPLOAD_SIZE_BYTES: usize = 512 * 1024 * 1024;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Root of the on-disk data tree. The database and storage paths are
    /// derived from it unless overridden individually.
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub max_upload_size_bytes: usize,
    /// Path to the ffmpeg binary used by the audio/video converter.
    pub ffmpeg_path: String,
    pub ffmpeg_enabled: bool,
    /// Worker/concurrency ceiling for the conversion job engine.
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    /// Enforced per-job converter execution ceiling.
    pub job_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let db_path = env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("db").join("app.db"));
        let storage_dir = env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("storage"));

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env_or("SERVER_PORT", DEFAULT_PORT),
            cors_origins,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            data_dir,
            db_path,
            storage_dir,
            max_upload_size_bytes: env_or("MAX_UPLOAD_SIZE_BYTES", DEFAULT_MAX_UPLOAD_SIZE_BYTES),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffmpeg_enabled: env_or("FFMPEG_ENABLED", true),
            max_workers: env_or("MAX_WORKERS", DEFAULT_MAX_WORKERS),
            poll_interval_ms: env_or("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            job_timeout_secs: env_or("JOB_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT_SECS),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", DEFAULT_CLEANUP_INTERVAL_SECS),
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Create the data directories this configuration points at.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.storage_dir)?;
        Ok(())
    }
}
