//! File handlers: upload, listing, download, deletion, batch archive.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use transmute_core::models::{FileKind, FileRecord};
use transmute_core::{AppError, Format};
use transmute_services::{build_archive, ArchiveEntry, ArchiveFormat};
use transmute_storage::{keys, Storage};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileMetadata {
    pub id: Uuid,
    pub original_filename: String,
    pub media_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl From<FileRecord> for FileMetadata {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename,
            media_type: record.media_type,
            extension: record.extension,
            size_bytes: record.size_bytes,
            checksum: record.checksum,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadMetadata {
    pub id: Uuid,
    pub original_filename: String,
    pub media_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    /// Output formats a conversion of this file can target.
    pub compatible_formats: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub metadata: UploadMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileMetadata>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkItemError {
    pub id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
    pub failed: Vec<BulkItemError>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchDownloadRequest {
    pub file_ids: Vec<Uuid>,
    /// "zip" (default) or "tar".
    #[serde(default)]
    pub format: Option<String>,
}

/// Detect the payload's format from its bytes, falling back to the client's
/// filename extension. The detected value wins when both disagree.
fn detect_media_type(data: &[u8], filename: &str) -> Format {
    if let Some(kind) = infer::get(data) {
        if let Ok(format) = kind.extension().parse() {
            return format;
        }
    }

    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or_else(Format::unknown)
}

/// Download name for a record: the original file stem with the record's own
/// extension, so conversion outputs land as `photo.png`, not `photo.jpg`.
fn download_filename(record: &FileRecord) -> String {
    let stem = std::path::Path::new(&record.original_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    format!("{}{}", stem, record.extension)
}

/// Persist one uploaded payload: bytes first, then the metadata row, rolling
/// the payload back if the row cannot be written.
async fn save_file(
    state: &AppState,
    original_filename: String,
    data: Vec<u8>,
) -> Result<UploadMetadata, HttpAppError> {
    let id = Uuid::new_v4();
    let media_type = detect_media_type(&data, &original_filename);
    let extension = media_type.dotted_extension();
    let storage_key = keys::upload_key(&format!("{}{}", id, extension));
    let checksum = hex::encode(Sha256::digest(&data));
    let size_bytes = data.len() as i64;

    state.storage.put(&storage_key, data).await?;

    let record = FileRecord {
        id,
        kind: FileKind::Upload,
        storage_key: storage_key.clone(),
        original_filename,
        media_type: media_type.to_string(),
        extension,
        size_bytes,
        checksum,
        created_at: Utc::now(),
    };

    if let Err(e) = state.files.create(&record).await {
        let _ = state.storage.delete(&storage_key).await;
        return Err(e.into());
    }

    let compatible_formats = state.engine.compatible_formats(&media_type);

    tracing::info!(
        file_id = %record.id,
        media_type = %record.media_type,
        size_bytes = record.size_bytes,
        "File uploaded"
    );

    Ok(UploadMetadata {
        id: record.id,
        original_filename: record.original_filename,
        media_type: record.media_type,
        extension: record.extension,
        size_bytes: record.size_bytes,
        checksum: record.checksum,
        created_at: record.created_at,
        compatible_formats,
    })
}

/// Upload a file (multipart field `file`).
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        HttpAppError(AppError::InvalidInput(format!(
            "Malformed multipart body: {}",
            e
        )))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|e| {
            HttpAppError(AppError::InvalidInput(format!(
                "Failed to read upload: {}",
                e
            )))
        })?;

        let metadata = save_file(&state, original_filename, data.to_vec()).await?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            metadata,
        }));
    }

    Err(AppError::InvalidInput("Multipart field 'file' is required".to_string()).into())
}

/// List all uploaded files.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FileListResponse>, HttpAppError> {
    let files = state.files.list(Some(FileKind::Upload)).await?;
    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileMetadata::from).collect(),
    }))
}

/// Download the raw bytes of an upload or a conversion output.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let record = state
        .files
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let data = state.storage.get(&record.storage_key).await?;
    let filename = download_filename(&record);

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        data,
    )
        .into_response())
}

/// Delete one file record and its payload. Conversion outputs linked to an
/// upload go with it; deleting an output also removes its job row.
async fn delete_file_and_dependents(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let record = state
        .files
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    if state.jobs.has_active_for_source(id).await? {
        return Err(AppError::Conflict(
            "File is the source of a conversion in progress".to_string(),
        ));
    }

    // Cascade: jobs reading from this file, plus their outputs.
    for job in state.jobs.jobs_for_source(id).await? {
        if let Some(output_id) = job.output_file_id {
            if let Some(output) = state.files.get(output_id).await? {
                if let Err(e) = state.storage.delete(&output.storage_key).await {
                    tracing::warn!(error = %e, key = %output.storage_key, "Failed to delete output payload");
                }
                state.files.delete(output_id).await?;
            }
        }
        state.jobs.delete(job.id).await?;
    }

    // If this record is itself a conversion output, drop its job row too.
    if record.kind == FileKind::Conversion {
        if let Some(job) = state.jobs.get_by_output(id).await? {
            state.jobs.delete(job.id).await?;
        }
    }

    if let Err(e) = state.storage.delete(&record.storage_key).await {
        tracing::warn!(error = %e, key = %record.storage_key, "Failed to delete payload, removing record anyway");
    }
    state.files.delete(id).await?;

    tracing::info!(file_id = %id, "File deleted");

    Ok(())
}

/// Delete an uploaded file (and any conversions made from it).
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    delete_file_and_dependents(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

/// Delete all uploaded files. Items fail independently; the response names
/// the failed subset.
pub async fn delete_all_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BulkDeleteResponse>, HttpAppError> {
    let uploads = state.files.list(Some(FileKind::Upload)).await?;

    let mut deleted = 0usize;
    let mut failed = Vec::new();
    for record in uploads {
        match delete_file_and_dependents(&state, record.id).await {
            Ok(()) => deleted += 1,
            Err(e) => failed.push(BulkItemError {
                id: record.id,
                error: e.to_string(),
            }),
        }
    }

    Ok(Json(BulkDeleteResponse { deleted, failed }))
}

/// Download several files as one archive. Missing items are skipped and
/// reported in the `x-missing-files` header; all-missing is a 404.
pub async fn batch_download(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BatchDownloadRequest>,
) -> Result<Response, HttpAppError> {
    if request.file_ids.is_empty() {
        return Err(AppError::InvalidInput("file_ids must not be empty".to_string()).into());
    }

    let format: ArchiveFormat = match request.format.as_deref() {
        None => ArchiveFormat::Zip,
        Some(raw) => raw
            .parse()
            .map_err(|e: anyhow::Error| HttpAppError(AppError::InvalidInput(e.to_string())))?,
    };

    let mut entries = Vec::new();
    let mut missing = Vec::new();
    for id in &request.file_ids {
        let loaded = match state.files.get(*id).await? {
            Some(record) => match state.storage.get(&record.storage_key).await {
                Ok(data) => Some((record, data)),
                Err(e) => {
                    tracing::warn!(error = %e, file_id = %id, "Payload unreadable, skipping in batch");
                    None
                }
            },
            None => None,
        };

        match loaded {
            Some((record, data)) => {
                let filename = download_filename(&record);
                entries.push(ArchiveEntry {
                    id: record.id,
                    filename,
                    data,
                });
            }
            None => missing.push(id.to_string()),
        }
    }

    if entries.is_empty() {
        return Err(
            AppError::NotFound("None of the requested files were found".to_string()).into(),
        );
    }

    let buffer =
        build_archive(format, entries).map_err(|e| HttpAppError(AppError::Internal(e.to_string())))?;

    let mut response = (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"transmute_batch.{}\"",
                    format.extension()
                ),
            ),
        ],
        buffer,
    )
        .into_response();

    if !missing.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&missing.join(",")) {
            response.headers_mut().insert("x-missing-files", value);
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_media_type_prefers_bytes_over_extension() {
        // PNG magic bytes with a lying .jpg name
        let png_magic = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let detected = detect_media_type(&png_magic, "photo.jpg");
        assert_eq!(detected.as_str(), "png");
    }

    #[test]
    fn test_detect_media_type_falls_back_to_extension() {
        let detected = detect_media_type(b"name,age\nalice,30\n", "table.csv");
        assert_eq!(detected.as_str(), "csv");
    }

    #[test]
    fn test_detect_media_type_unknown() {
        let detected = detect_media_type(b"????", "noext");
        assert_eq!(detected.as_str(), "bin");
    }

    #[test]
    fn test_download_filename_swaps_extension() {
        let record = FileRecord {
            id: Uuid::new_v4(),
            kind: FileKind::Conversion,
            storage_key: "conversions/x.png".to_string(),
            original_filename: "forest.jpg".to_string(),
            media_type: "png".to_string(),
            extension: ".png".to_string(),
            size_bytes: 1,
            checksum: "x".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(download_filename(&record), "forest.png");
    }
}
