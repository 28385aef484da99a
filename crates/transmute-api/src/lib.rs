//! Transmute HTTP API
//!
//! Axum surface over the conversion core: uploads, downloads, conversion
//! submission, job introspection, settings, and health probes.

pub mod api_doc;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

/// Application name reported by the health info endpoint.
pub const APP_NAME: &str = "transmute";

/// Application version reported by the health info endpoint.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
