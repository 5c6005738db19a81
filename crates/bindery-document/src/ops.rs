// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation orchestrator — the five document-level operations, each a
// sequential pipeline over the reader, composer, rasteriser, and image codec.
//
// All operations are byte-in/byte-out and fail on the first error: a failure
// on page 5 of 10 produces no output at all, never a partial batch. Inputs
// are parsed fresh per call; nothing is cached across operations.

use bindery_core::error::{BinderyError, Result};
use bindery_core::types::{ImageKind, OutputNaming};
use tracing::{info, instrument};

use crate::image::codec::{decode_image, encode_image};
use crate::pdf::{PdfComposer, PdfReader};
use crate::raster::render_page;

/// Raster scale for page-to-image conversion and unlocking.
pub const RASTER_SCALE: f32 = 2.0;

/// A finished output: suggested file name plus serialised bytes.
///
/// Ownership transfers to the caller; the engine keeps no reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutput {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Combine two or more documents into one, preserving input order and then
/// in-document page order.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[impl AsRef<[u8]>], naming: &OutputNaming) -> Result<OperationOutput> {
    if inputs.len() < 2 {
        return Err(BinderyError::InsufficientInput {
            needed: 2,
            got: inputs.len(),
        });
    }

    let mut composer = PdfComposer::new();
    for input in inputs {
        let reader = PdfReader::decode(input.as_ref(), None)?;
        for index in 0..reader.page_count() {
            composer.append_page(&reader, index)?;
        }
    }

    info!(pages = composer.page_count(), "documents merged");
    Ok(OperationOutput {
        name: naming.merged_name.clone(),
        bytes: composer.serialize()?,
    })
}

/// Split a document into one single-page document per page, named
/// `page_001.pdf` onward in input page order.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn split(inputs: &[impl AsRef<[u8]>], naming: &OutputNaming) -> Result<Vec<OperationOutput>> {
    let bytes = exactly_one(inputs)?;
    let reader = PdfReader::decode(bytes, None)?;

    let mut outputs = Vec::with_capacity(reader.page_count());
    for index in 0..reader.page_count() {
        let mut composer = PdfComposer::new();
        composer.append_page(&reader, index)?;
        outputs.push(OperationOutput {
            name: naming.page_name(index, "pdf"),
            bytes: composer.serialize()?,
        });
    }

    info!(pages = outputs.len(), "document split");
    Ok(outputs)
}

/// Render every page of a document to a JPEG image at scale 2.0.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn pdf_to_images(
    inputs: &[impl AsRef<[u8]>],
    naming: &OutputNaming,
) -> Result<Vec<OperationOutput>> {
    let bytes = exactly_one(inputs)?;
    let reader = PdfReader::decode(bytes, None)?;

    let mut outputs = Vec::with_capacity(reader.page_count());
    for (index, page_id) in reader.page_ids().into_iter().enumerate() {
        let rendered = render_page(reader.document(), page_id, RASTER_SCALE)?;
        let jpeg = encode_image(&rendered, ImageKind::Jpeg, None)?;
        outputs.push(OperationOutput {
            name: naming.page_name(index, ImageKind::Jpeg.extension()),
            bytes: jpeg,
        });
    }

    info!(pages = outputs.len(), "document rendered to images");
    Ok(outputs)
}

/// Compose a new document from images, one page per image, sized 1 pixel =
/// 1 point. The image kind comes from each file's declared name.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn images_to_pdf<N, B>(inputs: &[(N, B)], naming: &OutputNaming) -> Result<OperationOutput>
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    if inputs.is_empty() {
        return Err(BinderyError::EmptyInput("image"));
    }

    let mut composer = PdfComposer::new();
    for (name, bytes) in inputs {
        let kind = ImageKind::from_file_name(name.as_ref());
        let image = decode_image(bytes.as_ref(), kind)?;
        composer.append_image_page(&image, kind)?;
    }

    info!(pages = composer.page_count(), "images composed into document");
    Ok(OperationOutput {
        name: naming.images_name.clone(),
        bytes: composer.serialize()?,
    })
}

/// Remove password protection by re-authoring the document from rendered
/// pages.
///
/// Each page is rendered at scale 2.0, passed through the PNG codec, and
/// re-embedded at the page's original point size. The output is freshly
/// authored and carries no encryption dictionary; text is flattened to
/// raster in the process.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn unlock(
    inputs: &[impl AsRef<[u8]>],
    password: &str,
    naming: &OutputNaming,
) -> Result<OperationOutput> {
    if password.is_empty() {
        return Err(BinderyError::EmptyInput("password"));
    }
    let bytes = exactly_one(inputs)?;

    let reader = PdfReader::decode(bytes, Some(password))?;

    let mut composer = PdfComposer::new();
    for page_id in reader.page_ids() {
        let rendered = render_page(reader.document(), page_id, RASTER_SCALE)?;
        let png = encode_image(&rendered, ImageKind::Png, None)?;
        let image = decode_image(&png, ImageKind::Png)?;
        composer.append_image_page_sized(
            &image,
            ImageKind::Png,
            rendered.width() as f32 / RASTER_SCALE,
            rendered.height() as f32 / RASTER_SCALE,
        )?;
    }

    info!(pages = composer.page_count(), "document unlocked");
    Ok(OperationOutput {
        name: naming.unlocked_name.clone(),
        bytes: composer.serialize()?,
    })
}

/// Arity guard for the single-document operations.
fn exactly_one<T: AsRef<[u8]>>(inputs: &[T]) -> Result<&[u8]> {
    match inputs {
        [] => Err(BinderyError::EmptyInput("document")),
        [single] => Ok(single.as_ref()),
        more => Err(BinderyError::InsufficientInput {
            needed: 1,
            got: more.len(),
        }),
    }
}
