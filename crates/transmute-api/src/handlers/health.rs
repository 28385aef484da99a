//! Health endpoints: app info, liveness, readiness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use transmute_storage::Storage;

use crate::state::AppState;
use crate::{APP_NAME, APP_VERSION};

#[derive(Debug, Serialize, ToSchema)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Return application metadata.
pub async fn app_info() -> Json<AppInfo> {
    Json(AppInfo {
        name: APP_NAME,
        version: APP_VERSION,
    })
}

/// Simple liveness check to confirm the server is running.
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "alive" }))
}

/// Readiness check: database reachable and storage writable.
pub async fn readiness(State(state): State<Arc<AppState>>) -> Response {
    let mut checks: BTreeMap<&'static str, String> = BTreeMap::new();

    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => {
            checks.insert("database", "ok".to_string());
        }
        Err(e) => {
            checks.insert("database", format!("error: {}", e));
        }
    }

    let probe_key = format!("health/probe-{}", Uuid::new_v4());
    let storage_ok = match state.storage.put(&probe_key, b"ok".to_vec()).await {
        Ok(_) => state.storage.delete(&probe_key).await.is_ok(),
        Err(_) => false,
    };
    checks.insert(
        "storage",
        if storage_ok {
            "ok".to_string()
        } else {
            "error: storage probe failed".to_string()
        },
    );

    let ready = checks.values().all(|v| v == "ok");
    if ready {
        Json(json!({ "status": "ready", "checks": checks })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "checks": checks })),
        )
            .into_response()
    }
}
