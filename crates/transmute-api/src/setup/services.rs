//! Converter registration.
//!
//! Registration order is the resolution priority for overlapping pairs:
//! image first (it owns raster pairs like gif -> png), then data, then
//! ffmpeg, which keeps the remaining audio/video pairs.

use std::sync::Arc;

use transmute_convert::{ConverterRegistry, DataConverter, FfmpegConverter, ImageConverter};
use transmute_core::Config;

pub fn build_registry(config: &Config) -> ConverterRegistry {
    let mut registry = ConverterRegistry::new();

    registry.register(Arc::new(ImageConverter::new()));
    registry.register(Arc::new(DataConverter::new()));

    if config.ffmpeg_enabled {
        if let Some(ffmpeg) = FfmpegConverter::detect(&config.ffmpeg_path) {
            registry.register(Arc::new(ffmpeg));
        }
    }

    registry
}
