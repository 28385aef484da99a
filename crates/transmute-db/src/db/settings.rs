use sqlx::{Row, SqlitePool};

use transmute_core::models::{AppSettings, SettingsUpdate, Theme};
use transmute_core::AppError;

/// Single-row table; always read/write the row with this id.
const SETTINGS_ROW_ID: i64 = 1;

/// Repository for the process-wide settings record.
///
/// Readers always get a snapshot; updates replace fields atomically in the
/// single row.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the default row if it does not already exist.
    pub async fn seed_defaults(&self) -> Result<(), AppError> {
        let defaults = AppSettings::default();
        sqlx::query(
            r#"
            INSERT INTO app_settings (id, theme, auto_download, keep_originals, cleanup_ttl_minutes)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(SETTINGS_ROW_ID)
        .bind(defaults.theme.to_string())
        .bind(defaults.auto_download)
        .bind(defaults.keep_originals)
        .bind(defaults.cleanup_ttl_minutes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self) -> Result<AppSettings, AppError> {
        let row = sqlx::query("SELECT * FROM app_settings WHERE id = ?1")
            .bind(SETTINGS_ROW_ID)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(AppSettings::default());
        };

        let theme: Theme = row
            .get::<String, _>("theme")
            .parse()
            .map_err(|e| AppError::Internal(format!("Corrupt theme value: {}", e)))?;

        Ok(AppSettings {
            theme,
            auto_download: row.get("auto_download"),
            keep_originals: row.get("keep_originals"),
            cleanup_ttl_minutes: row.get("cleanup_ttl_minutes"),
        })
    }

    /// Apply a partial update; only provided fields are changed. Returns the
    /// updated snapshot.
    pub async fn update(&self, updates: SettingsUpdate) -> Result<AppSettings, AppError> {
        if let Some(ttl) = updates.cleanup_ttl_minutes {
            if ttl < 1 {
                return Err(AppError::InvalidInput(
                    "cleanup_ttl_minutes must be at least 1".to_string(),
                ));
            }
        }

        if updates.is_empty() {
            return self.get().await;
        }

        self.seed_defaults().await?;
        let current = self.get().await?;
        let merged = AppSettings {
            theme: updates.theme.unwrap_or(current.theme),
            auto_download: updates.auto_download.unwrap_or(current.auto_download),
            keep_originals: updates.keep_originals.unwrap_or(current.keep_originals),
            cleanup_ttl_minutes: updates
                .cleanup_ttl_minutes
                .unwrap_or(current.cleanup_ttl_minutes),
        };

        sqlx::query(
            r#"
            UPDATE app_settings
            SET theme = ?1, auto_download = ?2, keep_originals = ?3, cleanup_ttl_minutes = ?4
            WHERE id = ?5
            "#,
        )
        .bind(merged.theme.to_string())
        .bind(merged.auto_download)
        .bind(merged.keep_originals)
        .bind(merged.cleanup_ttl_minutes)
        .bind(SETTINGS_ROW_ID)
        .execute(&self.pool)
        .await?;

        Ok(merged)
    }
}
