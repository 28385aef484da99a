//! Route table and middleware stack.

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api_doc;
use crate::handlers::{conversions, files, health, jobs, settings};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/files", post(files::upload_file).get(files::list_files))
        .route("/files/all", delete(files::delete_all_files))
        .route("/files/batch", post(files::batch_download))
        .route(
            "/files/{id}",
            get(files::download_file).delete(files::delete_file),
        )
        .route("/conversions", post(conversions::create_conversion))
        .route("/conversions/complete", get(conversions::list_complete))
        .route(
            "/conversions/all",
            delete(conversions::delete_all_conversions),
        )
        .route("/conversions/{id}", delete(conversions::delete_conversion))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/stats", get(jobs::job_stats))
        .route("/jobs/{id}", get(jobs::get_job))
        .route(
            "/settings",
            get(settings::get_app_settings).patch(settings::update_app_settings),
        )
        .route("/health/info", get(health::app_info))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/api-docs/openapi.json", get(api_doc::openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(state.config.max_upload_size_bytes))
        .with_state(state)
}
