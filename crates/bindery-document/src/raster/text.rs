// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glyph handling for the page rasteriser.
//
// Fonts with an embedded TrueType/OpenType program (/FontFile2, /FontFile3)
// are outlined with `ttf-parser` and filled as vector paths. Fonts without an
// embedded program paint nothing, but advances are still honoured so the
// rest of the page keeps its layout.

use lopdf::{Dictionary, Document, Object};
use tiny_skia::PathBuilder;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use super::{number, resolve};

/// Glyph-space divisor for /Widths entries.
const GLYPH_SPACE: f32 = 1000.0;

/// Advance used when neither /Widths nor the font program knows the glyph.
const FALLBACK_ADVANCE: f32 = 0.5;

/// /Widths table of a simple (one-byte-code) font.
struct SimpleWidths {
    first_char: u32,
    /// Advances in text-space units (already divided by 1000).
    widths: Vec<f32>,
}

/// A font resource prepared for rendering.
pub struct LoadedFont {
    /// Raw embedded font program, when the document carries one.
    program: Option<Vec<u8>>,
    /// Two-byte codes addressing glyphs directly (Type0 identity CID fonts).
    cid: bool,
    widths: Option<SimpleWidths>,
    /// /BaseFont, for diagnostics.
    pub base_name: String,
}

impl LoadedFont {
    /// Prepare a font from its resource dictionary.
    pub fn load(doc: &Document, font_dict: &Dictionary) -> Self {
        let base_name = font_dict
            .get(b"BaseFont")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| match obj {
                Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
                _ => None,
            })
            .unwrap_or_else(|| "unknown".into());

        let subtype = font_dict
            .get(b"Subtype")
            .ok()
            .and_then(|obj| match obj {
                Object::Name(name) => Some(name.as_slice()),
                _ => None,
            })
            .unwrap_or(b"");

        if subtype == b"Type0" {
            // Composite font: glyph data lives on the descendant CID font.
            let descendant = font_dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| match obj {
                    Object::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(|obj| resolve(doc, obj))
                .and_then(|obj| obj.as_dict().ok());

            let program = descendant.and_then(|dict| embedded_program(doc, dict));
            return Self {
                program,
                cid: true,
                widths: None,
                base_name,
            };
        }

        Self {
            program: embedded_program(doc, font_dict),
            cid: false,
            widths: simple_widths(doc, font_dict),
            base_name,
        }
    }

    /// Whether this font can paint glyphs at all.
    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    /// Parse the embedded program into a face. Faces borrow the program
    /// bytes, so this is done per text run rather than stored.
    pub fn face(&self) -> Option<Face<'_>> {
        let program = self.program.as_deref()?;
        Face::parse(program, 0).ok()
    }

    /// Split a PDF string into character codes (one byte for simple fonts,
    /// big-endian pairs for CID fonts).
    pub fn decode_codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.cid {
            bytes
                .chunks(2)
                .map(|pair| {
                    let hi = u32::from(pair[0]);
                    let lo = pair.get(1).copied().map(u32::from).unwrap_or(0);
                    (hi << 8) | lo
                })
                .collect()
        } else {
            bytes.iter().map(|&byte| u32::from(byte)).collect()
        }
    }

    /// Glyph id for a character code.
    pub fn glyph_id(&self, face: &Face<'_>, code: u32) -> Option<GlyphId> {
        if self.cid {
            // Identity CID encoding: the code is the glyph id.
            Some(GlyphId(code as u16))
        } else {
            char::from_u32(code).and_then(|ch| face.glyph_index(ch))
        }
    }

    /// Horizontal advance of a code in text-space units (em = 1.0).
    ///
    /// Prefers the document's /Widths entry; falls back to the font program's
    /// own metrics, then to a neutral half-em.
    pub fn advance(&self, face: Option<&Face<'_>>, code: u32) -> f32 {
        if let Some(widths) = &self.widths
            && code >= widths.first_char
            && let Some(width) = widths.widths.get((code - widths.first_char) as usize)
        {
            return *width;
        }
        if let Some(face) = face
            && let Some(gid) = self.glyph_id(face, code)
            && let Some(advance) = face.glyph_hor_advance(gid)
        {
            let upem = face.units_per_em() as f32;
            if upem > 0.0 {
                return advance as f32 / upem;
            }
        }
        FALLBACK_ADVANCE
    }

    /// Whether a code triggers word spacing (the single-byte space code).
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.cid && code == 32
    }
}

/// Build the glyph outline for `gid` into a tiny-skia path, in font units.
pub fn glyph_outline(face: &Face<'_>, gid: GlyphId) -> Option<tiny_skia::Path> {
    let mut converter = PathConverter(PathBuilder::new());
    face.outline_glyph(gid, &mut converter)?;
    converter.0.finish()
}

/// Adapter feeding ttf-parser outlines into a tiny-skia path builder.
struct PathConverter(PathBuilder);

impl OutlineBuilder for PathConverter {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Units-per-em scale factor for a face, guarding degenerate values.
pub fn units_per_em(face: &Face<'_>) -> f32 {
    let upem = face.units_per_em() as f32;
    if upem > 0.0 { upem } else { 1000.0 }
}

/// Extract the embedded font program from a font or CID-font dictionary.
fn embedded_program(doc: &Document, font_dict: &Dictionary) -> Option<Vec<u8>> {
    let descriptor = resolve(doc, font_dict.get(b"FontDescriptor").ok()?)?
        .as_dict()
        .ok()?;
    // FontFile2 is TrueType, FontFile3 OpenType/CFF; both parse with
    // ttf-parser. FontFile (Type1) does not, so it is treated as absent.
    let stream = [b"FontFile2".as_slice(), b"FontFile3".as_slice()]
        .into_iter()
        .find_map(|key| descriptor.get(key).ok())
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_stream().ok())?;
    stream
        .decompressed_content()
        .ok()
        .or_else(|| Some(stream.content.clone()))
}

fn simple_widths(doc: &Document, font_dict: &Dictionary) -> Option<SimpleWidths> {
    let first_char = resolve(doc, font_dict.get(b"FirstChar").ok()?)
        .and_then(|obj| obj.as_i64().ok())
        .map(|value| value as u32)?;
    let widths = match resolve(doc, font_dict.get(b"Widths").ok()?)? {
        Object::Array(items) => items
            .iter()
            .map(|item| {
                resolve(doc, item)
                    .and_then(number)
                    .map(|width| width / GLYPH_SPACE)
            })
            .collect::<Option<Vec<f32>>>()?,
        _ => return None,
    };
    Some(SimpleWidths { first_char, widths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn simple_font_dict() -> (Document, Dictionary) {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "TestSans",
            "FirstChar" => 65,
            "Widths" => vec![
                Object::Integer(500),
                Object::Integer(750),
            ],
        };
        (doc, dict)
    }

    #[test]
    fn simple_font_decodes_single_bytes() {
        let (doc, dict) = simple_font_dict();
        let font = LoadedFont::load(&doc, &dict);
        assert!(!font.has_program());
        assert_eq!(font.decode_codes(b"AB"), vec![65, 66]);
    }

    #[test]
    fn widths_table_wins_over_fallback() {
        let (doc, dict) = simple_font_dict();
        let font = LoadedFont::load(&doc, &dict);
        assert_eq!(font.advance(None, 65), 0.5);
        assert_eq!(font.advance(None, 66), 0.75);
        // Outside the table: neutral fallback.
        assert_eq!(font.advance(None, 90), FALLBACK_ADVANCE);
    }

    #[test]
    fn cid_font_decodes_two_byte_codes() {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "TestCid",
        };
        let font = LoadedFont::load(&doc, &dict);
        assert_eq!(font.decode_codes(&[0x01, 0x02, 0x01, 0x03]), vec![0x0102, 0x0103]);
        assert!(!font.is_word_space(32));
    }

    #[test]
    fn space_triggers_word_spacing_only_for_simple_fonts() {
        let (doc, dict) = simple_font_dict();
        let font = LoadedFont::load(&doc, &dict);
        assert!(font.is_word_space(32));
        assert!(!font.is_word_space(65));
    }
}
