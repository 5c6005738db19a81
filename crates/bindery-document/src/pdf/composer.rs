// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF composer — build a new document from pages copied out of existing
// documents or fabricated from raster images, then serialise it.
//
// Composition is append-only: page order in the output is exactly the order
// of append calls. Copied pages are deep-cloned, so the output never borrows
// from a source document.

use std::collections::HashMap;
use std::io::Write;

use bindery_core::error::{BinderyError, Result};
use bindery_core::types::{ImageKind, PixelBuffer, PixelLayout};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, instrument, warn};

use super::reader::PdfReader;
use crate::image::codec;

/// Builds a new PDF document page by page.
pub struct PdfComposer {
    /// The document under construction.
    document: Document,
    /// Object id of the /Pages tree root.
    pages_id: ObjectId,
    /// Page object ids in append order.
    kids: Vec<ObjectId>,
}

impl PdfComposer {
    /// Create an empty document (catalog plus an empty page tree).
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");

        let pages_id = document.new_object_id();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(Vec::new()),
                "Count" => 0,
            }),
        );

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        document.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    // -- Page copying ---------------------------------------------------------

    /// Copy the page at 0-based `page_index` from `source` into this document,
    /// appending it as the last page.
    ///
    /// The page's full object graph (content streams, resources, fonts,
    /// images) is cloned, so the appended page stays valid after `source` is
    /// dropped.
    #[instrument(skip(self, source), fields(page_index))]
    pub fn append_page(&mut self, source: &PdfReader, page_index: usize) -> Result<()> {
        let page_id = source.page_id(page_index)?;

        let mut memo: HashMap<ObjectId, ObjectId> = HashMap::new();
        let cloned_id = self.clone_object_graph(source.document(), page_id, &mut memo)?;

        // The clone skipped /Parent; point the new page at our page tree.
        if let Ok(Object::Dictionary(page)) = self.document.get_object_mut(cloned_id) {
            page.set("Parent", Object::Reference(self.pages_id));
        }

        self.attach_page(cloned_id);
        debug!(objects = memo.len(), "page copied");
        Ok(())
    }

    // -- Image pages ----------------------------------------------------------

    /// Append a page sized exactly to the image's pixel dimensions
    /// (1 pixel = 1 point), with the image filling the page at origin (0, 0).
    pub fn append_image_page(&mut self, image: &PixelBuffer, kind: ImageKind) -> Result<()> {
        self.append_image_page_sized(image, kind, image.width() as f32, image.height() as f32)
    }

    /// Append an image page with explicit page geometry in points. The image
    /// is stretched to fill the whole page; callers use this to restore a
    /// page's original point dimensions after rendering it at a larger scale.
    #[instrument(skip(self, image), fields(
        px_width = image.width(),
        px_height = image.height(),
        width_pt,
        height_pt
    ))]
    pub fn append_image_page_sized(
        &mut self,
        image: &PixelBuffer,
        kind: ImageKind,
        width_pt: f32,
        height_pt: f32,
    ) -> Result<()> {
        let image_id = match kind {
            ImageKind::Jpeg => self.add_jpeg_image(image)?,
            ImageKind::Png => self.add_flate_image(image)?,
        };

        // Draw the unit image square scaled to the full page.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt),
                        Object::Real(0.0),
                        Object::Real(0.0),
                        Object::Real(height_pt),
                        Object::Real(0.0),
                        Object::Real(0.0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|err| BinderyError::Io(std::io::Error::other(err.to_string())))?;
        let content_id = self
            .document
            .add_object(Object::Stream(Stream::new(dictionary! {}, content_bytes)));

        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(self.pages_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => Object::Reference(image_id),
                },
            },
            "Contents" => Object::Reference(content_id),
        });

        self.attach_page(page_id);
        Ok(())
    }

    // -- Serialisation --------------------------------------------------------

    /// Serialise the document to PDF bytes. The output always decodes with
    /// [`PdfReader::decode`].
    #[instrument(skip(self), fields(pages = self.kids.len()))]
    pub fn serialize(mut self) -> Result<Vec<u8>> {
        self.document.compress();
        let mut output = Vec::new();
        self.document
            .save_to(&mut output)
            .map_err(|err| BinderyError::Io(std::io::Error::other(err.to_string())))?;
        debug!(bytes = output.len(), "document serialised");
        Ok(output)
    }

    // -- Internals ------------------------------------------------------------

    /// Register a finished page object in the /Pages tree.
    fn attach_page(&mut self, page_id: ObjectId) {
        self.kids.push(page_id);
        if let Ok(Object::Dictionary(pages)) = self.document.get_object_mut(self.pages_id) {
            pages.set(
                "Kids",
                Object::Array(self.kids.iter().map(|id| Object::Reference(*id)).collect()),
            );
            pages.set("Count", Object::Integer(self.kids.len() as i64));
        }
    }

    /// Clone the object with `id` (and everything it transitively references)
    /// from `source` into this document, returning its new id.
    ///
    /// `memo` maps source ids to target ids so shared resources are copied
    /// once and reference cycles terminate.
    fn clone_object_graph(
        &mut self,
        source: &Document,
        id: ObjectId,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(&copied) = memo.get(&id) {
            return Ok(copied);
        }

        // Reserve the target id before descending: a cycle back to `id`
        // resolves through the memo instead of recursing.
        let target_id = self.document.new_object_id();
        memo.insert(id, target_id);

        let object = source.get_object(id).map_err(|err| {
            BinderyError::MalformedDocument(format!("cannot read object {id:?}: {err}"))
        })?;
        let cloned = self.clone_object_value(source, object, memo)?;
        self.document.objects.insert(target_id, cloned);
        Ok(target_id)
    }

    fn clone_object_value(
        &mut self,
        source: &Document,
        object: &Object,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(
                self.clone_dictionary(source, dict, memo)?,
            )),
            Object::Array(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_object_value(source, item, memo)?);
                }
                Ok(Object::Array(cloned))
            }
            Object::Reference(id) => match source.get_object(*id) {
                Ok(_) => Ok(Object::Reference(
                    self.clone_object_graph(source, *id, memo)?,
                )),
                Err(err) => {
                    warn!(?id, %err, "unresolvable reference replaced with null");
                    Ok(Object::Null)
                }
            },
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(source, &stream.dict, memo)?;
                Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
            }
            // Booleans, numbers, strings, names and null are value types.
            other => Ok(other.clone()),
        }
    }

    /// Clone a dictionary, skipping /Parent: the only legitimate parent in the
    /// target is our own page tree, patched in by the caller.
    fn clone_dictionary(
        &mut self,
        source: &Document,
        dict: &Dictionary,
        memo: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<Dictionary> {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            cloned.set(key.clone(), self.clone_object_value(source, value, memo)?);
        }
        Ok(cloned)
    }

    /// Embed a pixel buffer as a DCTDecode (JPEG) image XObject.
    fn add_jpeg_image(&mut self, image: &PixelBuffer) -> Result<ObjectId> {
        let jpeg = codec::encode_image(image, ImageKind::Jpeg, None)?;
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        Ok(self.document.add_object(Object::Stream(stream)))
    }

    /// Embed a pixel buffer losslessly as a FlateDecode RGB image XObject,
    /// carrying the alpha channel (if any) as an SMask.
    fn add_flate_image(&mut self, image: &PixelBuffer) -> Result<ObjectId> {
        let (rgb, alpha) = split_channels(image);

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width() as i64,
            "Height" => image.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = alpha {
            let mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width() as i64,
                    "Height" => image.height() as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(&alpha)?,
            );
            let mask_id = self.document.add_object(Object::Stream(mask));
            dict.set("SMask", Object::Reference(mask_id));
        }

        let stream = Stream::new(dict, deflate(&rgb)?);
        Ok(self.document.add_object(Object::Stream(stream)))
    }
}

impl Default for PdfComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Separate a buffer into RGB triplets and, when any pixel is not fully
/// opaque, the alpha plane.
fn split_channels(image: &PixelBuffer) -> (Vec<u8>, Option<Vec<u8>>) {
    match image.layout() {
        PixelLayout::Rgb => (image.data().to_vec(), None),
        PixelLayout::Rgba => {
            let pixels = image.width() as usize * image.height() as usize;
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for chunk in image.data().chunks_exact(4) {
                rgb.extend_from_slice(&chunk[..3]);
                alpha.push(chunk[3]);
            }
            if alpha.iter().all(|&a| a == u8::MAX) {
                (rgb, None)
            } else {
                (rgb, Some(alpha))
            }
        }
    }
}

/// Zlib-compress a byte slice (FlateDecode stream payload).
fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_buffer(width: u32, height: u32, rgb: [u8; 3]) -> PixelBuffer {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        PixelBuffer::new(width, height, PixelLayout::Rgb, data).unwrap()
    }

    #[test]
    fn empty_document_round_trips() {
        let bytes = PdfComposer::new().serialize().unwrap();
        let reader = PdfReader::decode(&bytes, None).unwrap();
        assert_eq!(reader.page_count(), 0);
    }

    #[test]
    fn image_page_has_pixel_geometry() {
        let mut composer = PdfComposer::new();
        composer
            .append_image_page(&solid_buffer(120, 80, [10, 20, 30]), ImageKind::Png)
            .unwrap();
        let bytes = composer.serialize().unwrap();

        let reader = PdfReader::decode(&bytes, None).unwrap();
        assert_eq!(reader.page_count(), 1);
        let page_id = reader.page_id(0).unwrap();
        let (width, height) = reader.page_size(page_id).unwrap();
        assert_eq!(width, 120.0);
        assert_eq!(height, 80.0);
    }

    #[test]
    fn sized_image_page_uses_point_geometry() {
        let mut composer = PdfComposer::new();
        composer
            .append_image_page_sized(&solid_buffer(200, 100, [0, 0, 0]), ImageKind::Png, 100.0, 50.0)
            .unwrap();
        let bytes = composer.serialize().unwrap();

        let reader = PdfReader::decode(&bytes, None).unwrap();
        let (width, height) = reader.page_size(reader.page_id(0).unwrap()).unwrap();
        assert_eq!(width, 100.0);
        assert_eq!(height, 50.0);
    }

    #[test]
    fn copied_pages_survive_source_drop() {
        // Author a two-page document, then copy its pages in reverse order.
        let mut first = PdfComposer::new();
        first
            .append_image_page(&solid_buffer(50, 60, [255, 0, 0]), ImageKind::Png)
            .unwrap();
        first
            .append_image_page(&solid_buffer(70, 40, [0, 255, 0]), ImageKind::Png)
            .unwrap();
        let source_bytes = first.serialize().unwrap();

        let copied_bytes = {
            let source = PdfReader::decode(&source_bytes, None).unwrap();
            let mut composer = PdfComposer::new();
            composer.append_page(&source, 1).unwrap();
            composer.append_page(&source, 0).unwrap();
            composer.serialize().unwrap()
            // `source` dropped here; the copy must stay self-contained.
        };

        let reader = PdfReader::decode(&copied_bytes, None).unwrap();
        assert_eq!(reader.page_count(), 2);
        let first_size = reader.page_size(reader.page_id(0).unwrap()).unwrap();
        let second_size = reader.page_size(reader.page_id(1).unwrap()).unwrap();
        assert_eq!(first_size, (70.0, 40.0));
        assert_eq!(second_size, (50.0, 60.0));
    }

    #[test]
    fn append_page_out_of_range_is_typed() {
        let mut composer = PdfComposer::new();
        composer
            .append_image_page(&solid_buffer(10, 10, [0, 0, 0]), ImageKind::Png)
            .unwrap();
        let bytes = composer.serialize().unwrap();

        let source = PdfReader::decode(&bytes, None).unwrap();
        let mut target = PdfComposer::new();
        let err = target.append_page(&source, 5).unwrap_err();
        assert!(matches!(err, BinderyError::PageOutOfRange { page: 6, count: 1 }));
    }

    #[test]
    fn opaque_rgba_collapses_to_plain_rgb() {
        let data = vec![1u8, 2, 3, 255, 4, 5, 6, 255];
        let buffer = PixelBuffer::new(2, 1, PixelLayout::Rgba, data).unwrap();
        let (rgb, alpha) = split_channels(&buffer);
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
        assert!(alpha.is_none());
    }

    #[test]
    fn translucent_rgba_keeps_alpha_plane() {
        let data = vec![1u8, 2, 3, 128, 4, 5, 6, 255];
        let buffer = PixelBuffer::new(2, 1, PixelLayout::Rgba, data).unwrap();
        let (_, alpha) = split_channels(&buffer);
        assert_eq!(alpha, Some(vec![128, 255]));
    }
}
