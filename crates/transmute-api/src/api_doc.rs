//! OpenAPI document served at /api-docs/openapi.json.

use axum::Json;
use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers::conversions::{
    ConversionItem, ConversionListResponse, ConversionRequest, ConversionResponse,
    SourceFileMetadata,
};
use crate::handlers::files::{
    BatchDownloadRequest, BulkDeleteResponse, BulkItemError, FileListResponse, FileMetadata,
    MessageResponse, UploadMetadata, UploadResponse,
};
use crate::handlers::health::AppInfo;
use crate::handlers::jobs::{JobListResponse, JobResponse};
use transmute_core::models::{
    AppSettings, ConversionParams, JobError, JobErrorKind, JobStats, JobStatus, Quality,
    SettingsUpdate, Theme,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "transmute",
        description = "Self-hosted file conversion service",
        license(name = "MIT")
    ),
    components(schemas(
        AppInfo,
        AppSettings,
        BatchDownloadRequest,
        BulkDeleteResponse,
        BulkItemError,
        ConversionItem,
        ConversionListResponse,
        ConversionParams,
        ConversionRequest,
        ConversionResponse,
        ErrorResponse,
        FileListResponse,
        FileMetadata,
        JobError,
        JobErrorKind,
        JobListResponse,
        JobResponse,
        JobStats,
        JobStatus,
        MessageResponse,
        Quality,
        SettingsUpdate,
        SourceFileMetadata,
        Theme,
        UploadMetadata,
        UploadResponse,
    ))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
