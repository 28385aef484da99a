//! Settings handlers: snapshot read and partial update.

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use transmute_core::models::{AppSettings, SettingsUpdate};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Return the current application settings.
pub async fn get_app_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AppSettings>, HttpAppError> {
    let settings = state.settings.get().await?;
    Ok(Json(settings))
}

/// Partially update application settings. Only provided fields change.
#[tracing::instrument(skip(state, updates))]
pub async fn update_app_settings(
    State(state): State<Arc<AppState>>,
    ValidatedJson(updates): ValidatedJson<SettingsUpdate>,
) -> Result<Json<AppSettings>, HttpAppError> {
    let settings = state.settings.update(updates).await?;
    tracing::info!(
        theme = %settings.theme,
        keep_originals = settings.keep_originals,
        cleanup_ttl_minutes = settings.cleanup_ttl_minutes,
        "Settings updated"
    );
    Ok(Json(settings))
}
