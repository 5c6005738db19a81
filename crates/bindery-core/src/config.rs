// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use serde::{Deserialize, Serialize};

use crate::types::OutputNaming;

/// Persistent application settings.
///
/// The engine itself runs on fixed defaults (render scale 2.0, JPEG quality
/// 95); this struct exists so the front end can persist the output naming
/// convention alongside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output file naming convention.
    pub naming: OutputNaming,
    /// Raster scale used when converting pages to images.
    pub raster_scale: f32,
    /// JPEG quality (1-100) for page images.
    pub jpeg_quality: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            naming: OutputNaming::default(),
            raster_scale: 2.0,
            jpeg_quality: 95,
        }
    }
}
