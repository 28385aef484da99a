//! Test fixtures: small image and data payloads.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Small valid PNG with a color gradient.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 200, 255])
    }));
    encode(img, ImageFormat::Png)
}

/// Small valid JPEG.
pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 11 % 256) as u8, 90, (y * 3 % 256) as u8])
    }));
    encode(img, ImageFormat::Jpeg)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format).expect("encode fixture");
    cursor.into_inner()
}

pub fn csv_fixture() -> Vec<u8> {
    b"name,trees\nblack forest,900\nsherwood,400\n".to_vec()
}
