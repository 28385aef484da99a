//! Storage key layout
//!
//! Keys are `{prefix}/{uuid}{extension}`. The uuid makes collisions
//! impossible in practice and keeps keys opaque; the prefix separates
//! uploaded originals from conversion outputs so sweeps and debugging can
//! tell them apart on disk.

/// Key prefix for uploaded originals.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Key prefix for conversion outputs.
pub const CONVERSIONS_PREFIX: &str = "conversions";

/// Build the storage key for an uploaded original.
pub fn upload_key(filename: &str) -> String {
    format!("{}/{}", UPLOADS_PREFIX, filename)
}

/// Build the storage key for a conversion output.
pub fn conversion_key(filename: &str) -> String {
    format!("{}/{}", CONVERSIONS_PREFIX, filename)
}
