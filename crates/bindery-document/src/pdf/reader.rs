// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — decode a PDF byte stream (optionally password-protected) into
// a page-addressable document using the `lopdf` crate.

use bindery_core::error::{BinderyError, Result};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, instrument, warn};

/// Fallback page size (US Letter in points) when a page carries no MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// A decoded, read-only PDF document.
///
/// Wraps `lopdf::Document` and exposes the page tree in reading order. The
/// same instance feeds both the composer (page copying) and the rasteriser
/// (page rendering); it is never mutated after decoding.
#[derive(Debug)]
pub struct PdfReader {
    /// The underlying lopdf document, fully decrypted.
    document: Document,
}

impl PdfReader {
    /// Decode a PDF from raw bytes.
    ///
    /// A password is required exactly when the document is encrypted with a
    /// non-empty user password: supplying `None` for such a document (or a
    /// wrong password) fails with [`BinderyError::IncorrectPassword`], while
    /// structural failures surface as [`BinderyError::MalformedDocument`].
    /// The password is used only during this call and never retained.
    #[instrument(skip_all, fields(bytes_len = data.len(), with_password = password.is_some()))]
    pub fn decode(data: &[u8], password: Option<&str>) -> Result<Self> {
        // lopdf auto-authenticates with the empty password; a document that
        // still reports itself encrypted needs the caller's credential.
        let mut document = Document::load_mem(data).map_err(map_load_error)?;
        if document.is_encrypted() {
            let Some(password) = password else {
                return Err(BinderyError::IncorrectPassword);
            };
            document.decrypt(password).map_err(map_load_error)?;
            if document.is_encrypted() {
                return Err(BinderyError::IncorrectPassword);
            }
        }

        debug!(pages = document.get_pages().len(), "PDF decoded");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page object ids in reading order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.page_iter().collect()
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.document
            .page_iter()
            .nth(index)
            .ok_or(BinderyError::PageOutOfRange {
                page: index + 1,
                count: self.page_count(),
            })
    }

    /// Page width and height in points, from the MediaBox (inherited from the
    /// page tree when the page dictionary itself has none).
    pub fn page_size(&self, page_id: ObjectId) -> Result<(f32, f32)> {
        match self.inherited_page_attr(page_id, b"MediaBox") {
            Some(media_box) => rect_size(&self.document, &media_box).ok_or_else(|| {
                BinderyError::MalformedDocument(format!(
                    "page {page_id:?} has an unreadable MediaBox"
                ))
            }),
            None => {
                warn!(?page_id, "page has no MediaBox, assuming Letter");
                Ok(DEFAULT_PAGE_SIZE)
            }
        }
    }

    /// Borrow the underlying document for copy-forward or rasterisation.
    pub fn document(&self) -> &Document {
        &self.document
    }

    // -- Helpers --------------------------------------------------------------

    /// Look up a page attribute, walking up the /Parent chain for inheritable
    /// entries such as /MediaBox and /Resources.
    fn inherited_page_attr(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut dict_id = page_id;
        // Bounded walk: a deeper page tree than this is not a real document.
        for _ in 0..64 {
            let dict = self.document.get_dictionary(dict_id).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => dict_id = *parent,
                _ => return None,
            }
        }
        None
    }
}

/// Width and height of a PDF rectangle `[x0 y0 x1 y1]`, resolving indirect
/// entries.
fn rect_size(doc: &Document, rect: &Object) -> Option<(f32, f32)> {
    let rect = resolve(doc, rect)?;
    let array = match rect {
        Object::Array(array) if array.len() == 4 => array,
        _ => return None,
    };
    let mut coords = [0.0f32; 4];
    for (slot, item) in coords.iter_mut().zip(array) {
        *slot = number(resolve(doc, item)?)?;
    }
    let width = (coords[2] - coords[0]).abs();
    let height = (coords[3] - coords[1]).abs();
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some((width, height))
}

/// Follow a reference to its target object (identity for direct objects).
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Numeric value of an Integer or Real object.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn map_load_error(err: lopdf::Error) -> BinderyError {
    match err {
        // Anything the decryption layer rejects means the credential failed;
        // this must stay distinct from structural corruption (see ops::unlock).
        lopdf::Error::Decryption(_) => BinderyError::IncorrectPassword,
        other => BinderyError::MalformedDocument(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_malformed() {
        let err = PdfReader::decode(b"this is not a pdf", None).unwrap_err();
        assert!(matches!(err, BinderyError::MalformedDocument(_)));
    }

    #[test]
    fn truncated_header_is_malformed() {
        let err = PdfReader::decode(b"%PDF-1.5\n", None).unwrap_err();
        assert!(matches!(err, BinderyError::MalformedDocument(_)));
    }

    #[test]
    fn number_reads_integers_and_reals() {
        assert_eq!(number(&Object::Integer(612)), Some(612.0));
        assert_eq!(number(&Object::Real(841.89)), Some(841.89));
        assert_eq!(number(&Object::Null), None);
    }
}
