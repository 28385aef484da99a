use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Whether a file record was created by an upload or by a conversion job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Upload,
    Conversion,
}

impl Display for FileKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileKind::Upload => write!(f, "upload"),
            FileKind::Conversion => write!(f, "conversion"),
        }
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(FileKind::Upload),
            "conversion" => Ok(FileKind::Conversion),
            _ => Err(anyhow::anyhow!("Invalid file kind: {}", s)),
        }
    }
}

/// Persisted metadata for one stored byte payload.
///
/// The `storage_key` is exclusively owned by this record: deleting the record
/// must also reclaim the payload, and the payload is never rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub kind: FileKind,
    pub storage_key: String,
    pub original_filename: String,
    /// Normalized format token detected from the bytes (e.g. `jpeg`),
    /// not trusted from the client-supplied extension alone.
    pub media_type: String,
    /// Extension with leading dot (e.g. `.jpeg`).
    pub extension: String,
    pub size_bytes: i64,
    /// SHA-256 of the payload, hex encoded.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for FileRecord {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(FileRecord {
            id: row
                .get::<String, _>("id")
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse file id: {}", e).into()))?,
            kind: row
                .get::<String, _>("kind")
                .parse()
                .map_err(|e| sqlx::Error::Decode(format!("Failed to parse kind: {}", e).into()))?,
            storage_key: row.get("storage_key"),
            original_filename: row.get("original_filename"),
            media_type: row.get("media_type"),
            extension: row.get("extension"),
            size_bytes: row.get("size_bytes"),
            checksum: row.get("checksum"),
            created_at: row.get("created_at"),
        })
    }
}
