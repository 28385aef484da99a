use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// UI theme. Cosmetic only, no effect on the conversion core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Rubedo,
    Citrinitas,
    Viriditas,
    Nigredo,
    Albedo,
}

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::Rubedo,
        Theme::Citrinitas,
        Theme::Viriditas,
        Theme::Nigredo,
        Theme::Albedo,
    ];
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Theme::Rubedo => write!(f, "rubedo"),
            Theme::Citrinitas => write!(f, "citrinitas"),
            Theme::Viriditas => write!(f, "viriditas"),
            Theme::Nigredo => write!(f, "nigredo"),
            Theme::Albedo => write!(f, "albedo"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rubedo" => Ok(Theme::Rubedo),
            "citrinitas" => Ok(Theme::Citrinitas),
            "viriditas" => Ok(Theme::Viriditas),
            "nigredo" => Ok(Theme::Nigredo),
            "albedo" => Ok(Theme::Albedo),
            _ => Err(anyhow::anyhow!(
                "Invalid theme '{}'. Valid options: rubedo, citrinitas, viriditas, nigredo, albedo",
                s
            )),
        }
    }
}

/// Process-wide application settings, persisted as a single row.
///
/// Callers always fetch a snapshot; there is no ambient mutable global.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AppSettings {
    pub theme: Theme,
    /// Client-side convenience flag; the core does not act on it.
    pub auto_download: bool,
    /// When false, the job engine deletes the source file after a
    /// successful conversion.
    pub keep_originals: bool,
    /// Retention window driving the age-based cleanup sweep.
    pub cleanup_ttl_minutes: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Rubedo,
            auto_download: false,
            keep_originals: true,
            cleanup_ttl_minutes: 60,
        }
    }
}

/// Partial settings update; only provided fields are changed.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    pub auto_download: Option<bool>,
    pub keep_originals: Option<bool>,
    pub cleanup_ttl_minutes: Option<i64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.auto_download.is_none()
            && self.keep_originals.is_none()
            && self.cleanup_ttl_minutes.is_none()
    }
}
