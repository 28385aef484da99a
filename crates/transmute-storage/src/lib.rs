//! Transmute file store
//!
//! Byte payloads for uploads and conversion outputs, stored under opaque
//! generated keys. Callers never construct filesystem paths themselves;
//! key validation and layout live entirely in this crate.

pub mod keys;
pub mod local;
pub mod traits;

pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
