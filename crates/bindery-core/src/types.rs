// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bindery PDF workbench.

use serde::{Deserialize, Serialize};

use crate::error::BinderyError;

/// Channel layout of a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelLayout {
    Rgb,
    Rgba,
}

impl PixelLayout {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// A rectangular grid of pixels with an explicit channel layout.
///
/// Produced by page rasterisation and image decoding. The buffer length is
/// always `width * height * channels` and neither dimension may be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer, validating the size invariant.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
    ) -> Result<Self, BinderyError> {
        if width == 0 || height == 0 {
            return Err(BinderyError::Render(format!(
                "zero-sized pixel buffer ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(BinderyError::Render(format!(
                "pixel buffer length {} does not match {}x{}x{}",
                data.len(),
                width,
                height,
                layout.channels()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Channel values of the pixel at (x, y). Panics outside the grid, like
    /// slice indexing would.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.layout.channels();
        let offset = (y as usize * self.width as usize + x as usize) * c;
        &self.data[offset..offset + c]
    }
}

/// Image container formats the codec bridge understands.
///
/// The format is always taken from the file's declared type, never sniffed
/// from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Infer the image kind from a file name.
    ///
    /// `.png` selects PNG; every other name is treated as JPEG, matching the
    /// image-to-PDF selection policy.
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit('.').next().map(str::to_ascii_lowercase) {
            Some(ext) if ext == "png" => Self::Png,
            _ => Self::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Naming convention for operation outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNaming {
    /// Prefix for per-page outputs (split, pdf-to-images).
    pub page_prefix: String,
    /// Zero-pad width for the 1-based page number.
    pub pad_width: usize,
    /// Default name for a merged document.
    pub merged_name: String,
    /// Default name for a document composed from images.
    pub images_name: String,
    /// Default name for an unlocked document.
    pub unlocked_name: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            page_prefix: "page_".into(),
            pad_width: 3,
            merged_name: "merged.pdf".into(),
            images_name: "images.pdf".into(),
            unlocked_name: "unlocked.pdf".into(),
        }
    }
}

impl OutputNaming {
    /// File name for the page at 0-based `index`, e.g. `page_001.pdf`.
    pub fn page_name(&self, index: usize, extension: &str) -> String {
        format!(
            "{}{:0width$}.{}",
            self.page_prefix,
            index + 1,
            extension,
            width = self.pad_width
        )
    }
}
