//! Image codec adapter
//!
//! Wraps the `image` crate for raster-to-raster conversions. Decoding and
//! encoding are CPU-bound, so the work runs on the blocking pool; a panic
//! inside the codec surfaces as a classified failure, not a crash.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

use transmute_core::models::Quality;
use transmute_core::Format;

use crate::converter::{format_set, ConvertError, ConvertRequest, Converter};

const FORMATS: &[&str] = &["jpeg", "png", "gif", "bmp", "tiff", "webp", "ico"];

/// ICO containers cap dimensions at 256x256.
const ICO_MAX_DIMENSION: u32 = 256;

pub struct ImageConverter;

impl ImageConverter {
    pub fn new() -> Self {
        Self
    }

    fn image_format(format: &Format) -> Option<ImageFormat> {
        match format.as_str() {
            "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tiff" => Some(ImageFormat::Tiff),
            "webp" => Some(ImageFormat::WebP),
            "ico" => Some(ImageFormat::Ico),
            _ => None,
        }
    }

    fn jpeg_quality(quality: Option<Quality>) -> u8 {
        match quality.unwrap_or_default() {
            Quality::High => 95,
            Quality::Medium => 85,
            Quality::Low => 60,
        }
    }

    fn encode(
        img: DynamicImage,
        target: ImageFormat,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>, ConvertError> {
        let mut cursor = Cursor::new(Vec::new());

        match target {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel; flatten before encoding.
                let rgb = img.to_rgb8();
                let encoder =
                    JpegEncoder::new_with_quality(&mut cursor, Self::jpeg_quality(quality));
                rgb.write_with_encoder(encoder)
                    .map_err(|e| ConvertError::Failed(format!("JPEG encoding failed: {}", e)))?;
            }
            ImageFormat::Ico => {
                let (w, h) = (img.width(), img.height());
                let img = if w > ICO_MAX_DIMENSION || h > ICO_MAX_DIMENSION {
                    img.thumbnail(ICO_MAX_DIMENSION, ICO_MAX_DIMENSION)
                } else {
                    img
                };
                img.write_to(&mut cursor, target)
                    .map_err(|e| ConvertError::Failed(format!("ICO encoding failed: {}", e)))?;
            }
            _ => {
                img.write_to(&mut cursor, target).map_err(|e| {
                    ConvertError::Failed(format!("{:?} encoding failed: {}", target, e))
                })?;
            }
        }

        Ok(cursor.into_inner())
    }
}

impl Default for ImageConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn inputs(&self) -> BTreeSet<Format> {
        format_set(FORMATS)
    }

    fn compatible_outputs(&self, input: &Format) -> BTreeSet<Format> {
        let mut outputs = format_set(FORMATS);
        outputs.remove(input);
        outputs
    }

    async fn convert(
        &self,
        data: &[u8],
        request: &ConvertRequest,
    ) -> Result<Vec<u8>, ConvertError> {
        let target = Self::image_format(&request.output).ok_or(ConvertError::Unsupported {
            converter: "image",
            input: request.input.to_string(),
            output: request.output.to_string(),
        })?;

        let data = data.to_vec();
        let quality = request.params.quality;

        let handle = tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&data)
                .map_err(|e| ConvertError::CorruptInput(format!("Unreadable image: {}", e)))?;
            Self::encode(img, target, quality)
        });

        handle
            .await
            .map_err(|e| ConvertError::Failed(format!("Image codec worker panicked: {}", e)))?
    }
}
