//! Converter trait and shared types
//!
//! Converters declare their capability set up front and expose a single
//! in-memory conversion entry point. The engine treats them as black boxes:
//! bytes in, bytes out, or a classified failure. Nothing here assumes a
//! converter is fast or memory-bounded; isolation and timeouts are the
//! engine's job.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

use transmute_core::models::ConversionParams;
use transmute_core::Format;

/// One conversion invocation.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub input: Format,
    pub output: Format,
    pub params: ConversionParams,
}

/// Failure classification reported by a converter.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("{converter} does not support {input} to {output}")]
    Unsupported {
        converter: &'static str,
        input: String,
        output: String,
    },

    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable byte transformer for a declared set of format pairs.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Human-readable converter id.
    fn name(&self) -> &'static str;

    /// Formats this converter accepts as input.
    fn inputs(&self) -> BTreeSet<Format>;

    /// Valid output formats for a given input format. Not necessarily
    /// symmetric: a converter may read a format it cannot write.
    fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format>;

    /// Transform `data` according to `request`.
    async fn convert(&self, data: &[u8], request: &ConvertRequest)
        -> Result<Vec<u8>, ConvertError>;
}

/// Identifies a converter and its capability set, for startup logging and
/// introspection.
#[derive(Debug, Clone, Serialize)]
pub struct ConverterDescriptor {
    pub name: &'static str,
    pub inputs: Vec<String>,
}

/// Parse a set of static format tokens. Panics on invalid tokens, which is
/// acceptable only because the inputs are compile-time literals.
pub(crate) fn format_set(tokens: &[&str]) -> BTreeSet<Format> {
    tokens
        .iter()
        .map(|t| t.parse().expect("static format token"))
        .collect()
}
