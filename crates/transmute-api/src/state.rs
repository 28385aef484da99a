//! Application state shared by all handlers.

use sqlx::SqlitePool;
use std::sync::Arc;

use transmute_convert::ConverterRegistry;
use transmute_core::Config;
use transmute_db::{FileRepository, JobRepository, SettingsRepository};
use transmute_engine::ConversionEngine;
use transmute_storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub files: FileRepository,
    pub jobs: JobRepository,
    pub settings: SettingsRepository,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<ConverterRegistry>,
    pub engine: ConversionEngine,
    pub config: Config,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
