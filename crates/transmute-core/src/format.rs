//! Format identifier normalization
//!
//! Clients send format names in whatever shape their UI produced: `"PNG"`,
//! `".jpg"`, `"JPEG"`. All lookups in the converter registry and all format
//! comparisons use the normalized form so the same conversion never resolves
//! differently depending on spelling.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Aliases folded into a canonical token before lookup.
fn canonical_alias(s: &str) -> &str {
    match s {
        "jpg" => "jpeg",
        "tif" => "tiff",
        "yml" => "yaml",
        "htm" => "html",
        "heif" => "heic",
        "mpeg" => "mpg",
        other => other,
    }
}

/// A normalized file-format token (e.g. `jpeg`, `png`, `csv`).
///
/// Construction via [`FromStr`] lowercases, strips leading dots, drops any
/// character outside `[a-z0-9_-]`, and folds known aliases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Format(String);

#[derive(Debug, thiserror::Error)]
#[error("Invalid format identifier: {0:?}")]
pub struct InvalidFormat(pub String);

impl Format {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fallback token for payloads whose format cannot be determined.
    pub fn unknown() -> Format {
        Format("bin".to_string())
    }

    /// Extension with a leading dot, as stored on file records (`.jpeg`).
    pub fn dotted_extension(&self) -> String {
        format!(".{}", self.0)
    }
}

impl FromStr for Format {
    type Err = InvalidFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .trim_start_matches('.')
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();

        if cleaned.is_empty() {
            return Err(InvalidFormat(s.to_string()));
        }

        Ok(Format(canonical_alias(&cleaned).to_string()))
    }
}

impl TryFrom<String> for Format {
    type Error = InvalidFormat;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Format> for String {
    fn from(f: Format) -> Self {
        f.0
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Format {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
