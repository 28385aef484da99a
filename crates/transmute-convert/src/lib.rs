//! Transmute converter plugins
//!
//! The [`Converter`] trait is the boundary between the job engine and the
//! byte-transformation backends. Each adapter is a shim over an external
//! library or process; the registry maps (input, output) format pairs to
//! exactly one adapter.

pub mod converter;
pub mod data_convert;
pub mod ffmpeg_convert;
pub mod image_convert;
pub mod registry;

pub use converter::{ConvertError, ConvertRequest, Converter, ConverterDescriptor};
pub use data_convert::DataConverter;
pub use ffmpeg_convert::FfmpegConverter;
pub use image_convert::ImageConverter;
pub use registry::ConverterRegistry;
