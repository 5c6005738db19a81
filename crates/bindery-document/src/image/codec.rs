// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image codec bridge — decode JPEG/PNG byte streams into pixel buffers and
// encode pixel buffers back, using the `image` crate.
//
// The format is always the caller's declared kind; bytes are never sniffed.

use std::io::Cursor;

use bindery_core::error::{BinderyError, Result};
use bindery_core::types::{ImageKind, PixelBuffer, PixelLayout};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use tracing::{debug, instrument};

/// JPEG quality used when no explicit quality is requested.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Decode encoded image bytes into a pixel buffer.
///
/// Fails with [`BinderyError::UnsupportedImage`] when the bytes are not a
/// valid image of the declared kind.
#[instrument(skip(data), fields(bytes_len = data.len()))]
pub fn decode_image(data: &[u8], kind: ImageKind) -> Result<PixelBuffer> {
    let format = match kind {
        ImageKind::Jpeg => ImageFormat::Jpeg,
        ImageKind::Png => ImageFormat::Png,
    };

    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|err| BinderyError::UnsupportedImage(format!("{}: {err}", kind.mime_type())))?;

    debug!(
        width = decoded.width(),
        height = decoded.height(),
        "image decoded"
    );

    if decoded.color().has_alpha() {
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        PixelBuffer::new(width, height, PixelLayout::Rgba, rgba.into_raw())
    } else {
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        PixelBuffer::new(width, height, PixelLayout::Rgb, rgb.into_raw())
    }
}

/// Encode a pixel buffer as JPEG or PNG bytes.
///
/// JPEG encoding drops any alpha channel and uses `quality` (1-100,
/// defaulting to [`DEFAULT_JPEG_QUALITY`]); PNG encoding is lossless and
/// keeps the alpha channel.
#[instrument(skip(buffer), fields(width = buffer.width(), height = buffer.height()))]
pub fn encode_image(buffer: &PixelBuffer, kind: ImageKind, quality: Option<u8>) -> Result<Vec<u8>> {
    match kind {
        ImageKind::Jpeg => {
            let rgb = to_rgb_image(buffer)?;
            let mut output = Vec::new();
            let encoder =
                JpegEncoder::new_with_quality(&mut output, quality.unwrap_or(DEFAULT_JPEG_QUALITY));
            rgb.write_with_encoder(encoder).map_err(|err| {
                BinderyError::UnsupportedImage(format!("JPEG encoding failed: {err}"))
            })?;
            Ok(output)
        }
        ImageKind::Png => {
            let dynamic = to_dynamic_image(buffer)?;
            let mut cursor = Cursor::new(Vec::new());
            dynamic.write_to(&mut cursor, ImageFormat::Png).map_err(|err| {
                BinderyError::UnsupportedImage(format!("PNG encoding failed: {err}"))
            })?;
            Ok(cursor.into_inner())
        }
    }
}

/// View a pixel buffer as an RGB image, discarding alpha if present.
fn to_rgb_image(buffer: &PixelBuffer) -> Result<RgbImage> {
    let data = match buffer.layout() {
        PixelLayout::Rgb => buffer.data().to_vec(),
        PixelLayout::Rgba => buffer
            .data()
            .chunks_exact(4)
            .flat_map(|px| px[..3].to_vec())
            .collect(),
    };
    RgbImage::from_raw(buffer.width(), buffer.height(), data)
        .ok_or_else(|| BinderyError::UnsupportedImage("pixel buffer shape mismatch".into()))
}

fn to_dynamic_image(buffer: &PixelBuffer) -> Result<DynamicImage> {
    match buffer.layout() {
        PixelLayout::Rgb => {
            RgbImage::from_raw(buffer.width(), buffer.height(), buffer.data().to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        PixelLayout::Rgba => {
            RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.data().to_vec())
                .map(DynamicImage::ImageRgba8)
        }
    }
    .ok_or_else(|| BinderyError::UnsupportedImage("pixel buffer shape mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 17 % 256) as u8);
                data.push((y * 31 % 256) as u8);
                data.push(200);
            }
        }
        PixelBuffer::new(width, height, PixelLayout::Rgb, data).unwrap()
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let buffer = gradient_buffer(16, 9);
        let png = encode_image(&buffer, ImageKind::Png, None).unwrap();
        let back = decode_image(&png, ImageKind::Png).unwrap();
        assert_eq!(back, buffer);
    }

    #[test]
    fn rgba_alpha_survives_png() {
        let data = vec![
            255, 0, 0, 128, //
            0, 255, 0, 255, //
        ];
        let buffer = PixelBuffer::new(2, 1, PixelLayout::Rgba, data).unwrap();
        let png = encode_image(&buffer, ImageKind::Png, None).unwrap();
        let back = decode_image(&png, ImageKind::Png).unwrap();
        assert_eq!(back.layout(), PixelLayout::Rgba);
        assert_eq!(back.pixel(0, 0)[3], 128);
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let buffer = gradient_buffer(20, 10);
        let jpeg = encode_image(&buffer, ImageKind::Jpeg, Some(90)).unwrap();
        let back = decode_image(&jpeg, ImageKind::Jpeg).unwrap();
        assert_eq!(back.width(), 20);
        assert_eq!(back.height(), 10);
        assert_eq!(back.layout(), PixelLayout::Rgb);
    }

    #[test]
    fn declared_format_is_trusted_not_sniffed() {
        let buffer = gradient_buffer(4, 4);
        let png = encode_image(&buffer, ImageKind::Png, None).unwrap();
        // PNG bytes declared as JPEG must fail, not silently fall back.
        let err = decode_image(&png, ImageKind::Jpeg).unwrap_err();
        assert!(matches!(err, BinderyError::UnsupportedImage(_)));
    }

    #[test]
    fn garbage_bytes_are_unsupported() {
        let err = decode_image(b"not an image at all", ImageKind::Png).unwrap_err();
        assert!(matches!(err, BinderyError::UnsupportedImage(_)));
    }
}
