// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bindery-document — the PDF processing engine behind Bindery.
//
// Provides PDF decoding (including password-protected documents), document
// composition (page copying and image pages), page rasterisation, an image
// codec bridge, and the five document-level operations (merge, split,
// pdf-to-images, images-to-pdf, unlock). All operations are byte-in /
// byte-out; the engine never touches the filesystem.

pub mod image;
pub mod ops;
pub mod pdf;
pub mod raster;

// Re-export the primary entry points so callers can use
// `bindery_document::PdfReader` etc.
pub use self::image::codec::{decode_image, encode_image};
pub use ops::{OperationOutput, images_to_pdf, merge, pdf_to_images, split, unlock};
pub use pdf::composer::PdfComposer;
pub use pdf::reader::PdfReader;
pub use raster::render_page;
