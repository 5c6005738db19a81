// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasteriser — interpret a page's content stream onto a tiny-skia
// pixmap.
//
// The interpreter covers the constructs the composer emits plus the common
// core of real-world documents: path construction and painting, RGB/Gray/
// CMYK colour, clipping, image and form XObjects, and text set in fonts with
// embedded TrueType/OpenType programs. Output is deterministic for a given
// (page, scale) pair.

pub mod text;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use bindery_core::error::{BinderyError, Result};
use bindery_core::types::{PixelBuffer, PixelLayout};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tiny_skia::{
    Color, FillRule, IntSize, LineCap, LineJoin, Mask, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Stroke, StrokeDash, Transform,
};
use tracing::{debug, instrument, warn};

pub(crate) use crate::pdf::reader::{number, resolve};

use text::{LoadedFont, glyph_outline, units_per_em};

/// Fallback page rectangle (US Letter) when a page carries no MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Render a page to an RGBA pixel buffer at the given scale.
///
/// Output dimensions are `ceil(width × scale)` by `ceil(height × scale)`
/// over a white background. Content the interpreter cannot execute at all
/// (an undecodable content stream, an unworkable pixmap) fails with
/// [`BinderyError::Render`]; the caller decides what to do with the batch.
#[instrument(skip(doc))]
pub fn render_page(doc: &Document, page_id: ObjectId, scale: f32) -> Result<PixelBuffer> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(BinderyError::Render(format!(
            "scale must be positive, got {scale}"
        )));
    }

    let [x0, y0, x1, y1] = media_box(doc, page_id);
    let width_pt = (x1 - x0).abs();
    let height_pt = (y1 - y0).abs();
    let px_width = (width_pt * scale).ceil() as u32;
    let px_height = (height_pt * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(px_width, px_height).ok_or_else(|| {
        BinderyError::Render(format!("cannot allocate {px_width}x{px_height} surface"))
    })?;
    pixmap.fill(Color::WHITE);

    // PDF user space (origin bottom-left) to pixels (origin top-left).
    let base = Transform::from_row(
        scale,
        0.0,
        0.0,
        -scale,
        -x0.min(x1) * scale,
        y0.max(y1) * scale,
    );

    let content_bytes = doc
        .get_page_content(page_id)
        .map_err(|err| BinderyError::Render(format!("unreadable page content: {err}")))?;
    let content = Content::decode(&content_bytes)
        .map_err(|err| BinderyError::Render(format!("undecodable content stream: {err}")))?;
    let resources = page_resources(doc, page_id);

    let mut interpreter = Interpreter::new(doc, pixmap, base);
    let mut visited_forms = HashSet::new();
    interpreter.execute(&content.operations, &resources, &mut visited_forms)?;

    debug!(px_width, px_height, "page rendered");
    interpreter.into_buffer()
}

// ---------------------------------------------------------------------------
// Graphics state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct TextParams {
    font_name: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// Tz value divided by 100.
    h_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font_name: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Transform,
    fill_color: [f32; 3],
    stroke_color: [f32; 3],
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    dash: Option<(Vec<f32>, f32)>,
    clip: Option<Mask>,
    text: TextParams,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Transform::identity(),
            fill_color: [0.0, 0.0, 0.0],
            stroke_color: [0.0, 0.0, 0.0],
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            clip: None,
            text: TextParams::default(),
        }
    }
}

type FontCache = HashMap<Vec<u8>, Option<Rc<LoadedFont>>>;

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

struct Interpreter<'a> {
    doc: &'a Document,
    pixmap: Pixmap,
    base: Transform,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    path: PathBuilder,
    /// Set by W/W*; applied when the current path is painted or dropped.
    pending_clip: Option<FillRule>,
    text_matrix: Transform,
    line_matrix: Transform,
    warned_fonts: HashSet<String>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a Document, pixmap: Pixmap, base: Transform) -> Self {
        Self {
            doc,
            pixmap,
            base,
            state: GraphicsState::default(),
            stack: Vec::new(),
            path: PathBuilder::new(),
            pending_clip: None,
            text_matrix: Transform::identity(),
            line_matrix: Transform::identity(),
            warned_fonts: HashSet::new(),
        }
    }

    fn into_buffer(self) -> Result<PixelBuffer> {
        let width = self.pixmap.width();
        let height = self.pixmap.height();
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        PixelBuffer::new(width, height, PixelLayout::Rgba, data)
    }

    fn device_transform(&self) -> Transform {
        self.base.pre_concat(self.state.ctm)
    }

    fn execute(
        &mut self,
        operations: &[Operation],
        resources: &Dictionary,
        visited_forms: &mut HashSet<ObjectId>,
    ) -> Result<()> {
        let mut fonts: FontCache = HashMap::new();

        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                // -- Graphics state ------------------------------------------
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(previous) = self.stack.pop() {
                        self.state = previous;
                    }
                }
                "cm" => {
                    if let Some([a, b, c, d, e, f]) = numbers::<6>(operands) {
                        self.state.ctm = self
                            .state
                            .ctm
                            .pre_concat(Transform::from_row(a, b, c, d, e, f));
                    }
                }
                "w" => {
                    if let Some([width]) = numbers::<1>(operands) {
                        self.state.line_width = width.max(0.0);
                    }
                }
                "J" => {
                    if let Some([cap]) = numbers::<1>(operands) {
                        self.state.line_cap = match cap as i64 {
                            1 => LineCap::Round,
                            2 => LineCap::Square,
                            _ => LineCap::Butt,
                        };
                    }
                }
                "j" => {
                    if let Some([join]) = numbers::<1>(operands) {
                        self.state.line_join = match join as i64 {
                            1 => LineJoin::Round,
                            2 => LineJoin::Bevel,
                            _ => LineJoin::Miter,
                        };
                    }
                }
                "M" => {
                    if let Some([limit]) = numbers::<1>(operands) {
                        self.state.miter_limit = limit.max(1.0);
                    }
                }
                "d" => {
                    let pattern: Vec<f32> = operands
                        .first()
                        .and_then(|obj| obj.as_array().ok())
                        .map(|array| array.iter().filter_map(number).map(f32::abs).collect())
                        .unwrap_or_default();
                    let phase = operands.get(1).and_then(number).unwrap_or(0.0);
                    self.state.dash = if pattern.is_empty() || pattern.iter().all(|&v| v == 0.0) {
                        None
                    } else {
                        Some((pattern, phase))
                    };
                }
                "gs" => {
                    if let Some(name) = name_operand(operands, 0) {
                        self.apply_ext_g_state(resources, &name);
                    }
                }
                "ri" | "i" => {}

                // -- Colour --------------------------------------------------
                "rg" => {
                    if let Some(rgb) = numbers::<3>(operands) {
                        self.state.fill_color = rgb;
                    }
                }
                "RG" => {
                    if let Some(rgb) = numbers::<3>(operands) {
                        self.state.stroke_color = rgb;
                    }
                }
                "g" => {
                    if let Some([gray]) = numbers::<1>(operands) {
                        self.state.fill_color = [gray, gray, gray];
                    }
                }
                "G" => {
                    if let Some([gray]) = numbers::<1>(operands) {
                        self.state.stroke_color = [gray, gray, gray];
                    }
                }
                "k" => {
                    if let Some([c, m, y, kk]) = numbers::<4>(operands) {
                        self.state.fill_color = cmyk_to_rgb(c, m, y, kk);
                    }
                }
                "K" => {
                    if let Some([c, m, y, kk]) = numbers::<4>(operands) {
                        self.state.stroke_color = cmyk_to_rgb(c, m, y, kk);
                    }
                }
                // Generic colour-space operators: interpret by operand count,
                // ignoring pattern names.
                "sc" | "scn" => {
                    if let Some(color) = generic_color(operands) {
                        self.state.fill_color = color;
                    }
                }
                "SC" | "SCN" => {
                    if let Some(color) = generic_color(operands) {
                        self.state.stroke_color = color;
                    }
                }
                "cs" | "CS" => {}

                // -- Path construction ---------------------------------------
                "m" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        self.path.move_to(x, y);
                    }
                }
                "l" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        self.path.line_to(x, y);
                    }
                }
                "c" => {
                    if let Some([x1, y1, x2, y2, x, y]) = numbers::<6>(operands) {
                        self.path.cubic_to(x1, y1, x2, y2, x, y);
                    }
                }
                "v" => {
                    if let Some([x2, y2, x, y]) = numbers::<4>(operands)
                        && let Some(last) = self.path.last_point()
                    {
                        self.path.cubic_to(last.x, last.y, x2, y2, x, y);
                    }
                }
                "y" => {
                    if let Some([x1, y1, x, y]) = numbers::<4>(operands) {
                        self.path.cubic_to(x1, y1, x, y, x, y);
                    }
                }
                "re" => {
                    if let Some([x, y, w, h]) = numbers::<4>(operands) {
                        self.path.move_to(x, y);
                        self.path.line_to(x + w, y);
                        self.path.line_to(x + w, y + h);
                        self.path.line_to(x, y + h);
                        self.path.close();
                    }
                }
                "h" => self.path.close(),

                // -- Clipping ------------------------------------------------
                "W" => self.pending_clip = Some(FillRule::Winding),
                "W*" => self.pending_clip = Some(FillRule::EvenOdd),

                // -- Path painting -------------------------------------------
                "f" | "F" => self.paint_path(true, false, FillRule::Winding, false),
                "f*" => self.paint_path(true, false, FillRule::EvenOdd, false),
                "S" => self.paint_path(false, true, FillRule::Winding, false),
                "s" => self.paint_path(false, true, FillRule::Winding, true),
                "B" => self.paint_path(true, true, FillRule::Winding, false),
                "B*" => self.paint_path(true, true, FillRule::EvenOdd, false),
                "b" => self.paint_path(true, true, FillRule::Winding, true),
                "b*" => self.paint_path(true, true, FillRule::EvenOdd, true),
                "n" => self.paint_path(false, false, FillRule::Winding, false),

                // -- Text ----------------------------------------------------
                "BT" => {
                    self.text_matrix = Transform::identity();
                    self.line_matrix = Transform::identity();
                }
                "ET" => {}
                "Tf" => {
                    self.state.text.font_name = match operands.first() {
                        Some(Object::Name(name)) => Some(name.clone()),
                        _ => None,
                    };
                    self.state.text.size = operands.get(1).and_then(number).unwrap_or(0.0);
                }
                "Td" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.state.text.leading = -ty;
                        self.next_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some([a, b, c, d, e, f]) = numbers::<6>(operands) {
                        self.text_matrix = Transform::from_row(a, b, c, d, e, f);
                        self.line_matrix = self.text_matrix;
                    }
                }
                "T*" => self.next_line(0.0, -self.state.text.leading),
                "Tc" => {
                    if let Some([spacing]) = numbers::<1>(operands) {
                        self.state.text.char_spacing = spacing;
                    }
                }
                "Tw" => {
                    if let Some([spacing]) = numbers::<1>(operands) {
                        self.state.text.word_spacing = spacing;
                    }
                }
                "Tz" => {
                    if let Some([scale]) = numbers::<1>(operands) {
                        self.state.text.h_scale = scale / 100.0;
                    }
                }
                "TL" => {
                    if let Some([leading]) = numbers::<1>(operands) {
                        self.state.text.leading = leading;
                    }
                }
                "Ts" => {
                    if let Some([rise]) = numbers::<1>(operands) {
                        self.state.text.rise = rise;
                    }
                }
                "Tr" => {
                    self.state.text.render_mode =
                        operands.first().and_then(number).unwrap_or(0.0) as i64;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let bytes = bytes.clone();
                        self.show_text(&bytes, resources, &mut fonts);
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let bytes = bytes.clone();
                        self.show_text(&bytes, resources, &mut fonts);
                    }
                }
                "\"" => {
                    if let Some([word, char_]) = numbers::<2>(&operands[..operands.len().min(2)]) {
                        self.state.text.word_spacing = word;
                        self.state.text.char_spacing = char_;
                    }
                    self.next_line(0.0, -self.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        let bytes = bytes.clone();
                        self.show_text(&bytes, resources, &mut fonts);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let items = items.clone();
                        for item in &items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show_text(bytes, resources, &mut fonts);
                                }
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * self.state.text.size
                                            * self.state.text.h_scale;
                                        self.text_matrix = self
                                            .text_matrix
                                            .pre_concat(Transform::from_translate(tx, 0.0));
                                    }
                                }
                            }
                        }
                    }
                }

                // -- XObjects ------------------------------------------------
                "Do" => {
                    if let Some(name) = name_operand(operands, 0) {
                        self.run_xobject(&name, resources, visited_forms)?;
                    }
                }

                // Inline images, shading, marked content, type 3 glyph
                // metrics: not drawn.
                _ => {}
            }
        }

        Ok(())
    }

    // -- Painting helpers -----------------------------------------------------

    fn paint_path(&mut self, fill: bool, stroke: bool, rule: FillRule, close_first: bool) {
        if close_first {
            self.path.close();
        }
        let builder = std::mem::replace(&mut self.path, PathBuilder::new());
        let Some(path) = builder.finish() else {
            self.pending_clip = None;
            return;
        };
        let transform = self.device_transform();

        if fill {
            let mut paint = Paint::default();
            paint.set_color(rgb_color(self.state.fill_color, self.state.fill_alpha));
            paint.anti_alias = true;
            self.pixmap
                .fill_path(&path, &paint, rule, transform, self.state.clip.as_ref());
        }
        if stroke {
            let mut paint = Paint::default();
            paint.set_color(rgb_color(self.state.stroke_color, self.state.stroke_alpha));
            paint.anti_alias = true;
            let stroke_props = Stroke {
                width: self.state.line_width.max(0.1),
                miter_limit: self.state.miter_limit,
                line_cap: self.state.line_cap,
                line_join: self.state.line_join,
                dash: self
                    .state
                    .dash
                    .clone()
                    .and_then(|(pattern, phase)| StrokeDash::new(pattern, phase)),
            };
            self.pixmap.stroke_path(
                &path,
                &paint,
                &stroke_props,
                transform,
                self.state.clip.as_ref(),
            );
        }

        if let Some(clip_rule) = self.pending_clip.take() {
            self.apply_clip(&path, clip_rule, transform);
        }
    }

    fn apply_clip(&mut self, path: &Path, rule: FillRule, transform: Transform) {
        match &mut self.state.clip {
            Some(mask) => mask.intersect_path(path, rule, true, transform),
            None => {
                if let Some(mut mask) = Mask::new(self.pixmap.width(), self.pixmap.height()) {
                    mask.fill_path(path, rule, true, transform);
                    self.state.clip = Some(mask);
                }
            }
        }
    }

    fn apply_ext_g_state(&mut self, resources: &Dictionary, name: &[u8]) {
        let Some(states) = resources
            .get(b"ExtGState")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };
        let Some(state_dict) = states
            .get(name)
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return;
        };

        if let Ok(ca) = state_dict.get(b"ca")
            && let Some(alpha) = number(ca)
        {
            self.state.fill_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Ok(ca) = state_dict.get(b"CA")
            && let Some(alpha) = number(ca)
        {
            self.state.stroke_alpha = alpha.clamp(0.0, 1.0);
        }
        if let Ok(lw) = state_dict.get(b"LW")
            && let Some(width) = number(lw)
        {
            self.state.line_width = width.max(0.0);
        }
    }

    // -- Text -----------------------------------------------------------------

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = self.line_matrix.pre_concat(Transform::from_translate(tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn show_text(&mut self, bytes: &[u8], resources: &Dictionary, fonts: &mut FontCache) {
        let Some(font_name) = self.state.text.font_name.clone() else {
            return;
        };
        let Some(font) = self.font_for(&font_name, resources, fonts) else {
            return;
        };

        let size = self.state.text.size;
        let h_scale = self.state.text.h_scale;
        // Mode 3 is invisible (common in OCR layers); 7 is clip-only.
        let paint_glyphs = !matches!(self.state.text.render_mode, 3 | 7);
        let face = font.face();

        for code in font.decode_codes(bytes) {
            if paint_glyphs
                && let Some(face) = &face
                && let Some(gid) = font.glyph_id(face, code)
                && let Some(outline) = glyph_outline(face, gid)
            {
                let upem = units_per_em(face);
                let glyph_transform = self
                    .device_transform()
                    .pre_concat(self.text_matrix)
                    .pre_concat(Transform::from_row(
                        size * h_scale,
                        0.0,
                        0.0,
                        size,
                        0.0,
                        self.state.text.rise,
                    ))
                    .pre_concat(Transform::from_scale(1.0 / upem, 1.0 / upem));

                let mut paint = Paint::default();
                paint.set_color(rgb_color(self.state.fill_color, self.state.fill_alpha));
                paint.anti_alias = true;
                self.pixmap.fill_path(
                    &outline,
                    &paint,
                    FillRule::Winding,
                    glyph_transform,
                    self.state.clip.as_ref(),
                );
            }

            let mut advance = font.advance(face.as_ref(), code) * size + self.state.text.char_spacing;
            if font.is_word_space(code) {
                advance += self.state.text.word_spacing;
            }
            self.text_matrix = self
                .text_matrix
                .pre_concat(Transform::from_translate(advance * h_scale, 0.0));
        }
    }

    fn font_for(
        &mut self,
        name: &[u8],
        resources: &Dictionary,
        fonts: &mut FontCache,
    ) -> Option<Rc<LoadedFont>> {
        if let Some(cached) = fonts.get(name) {
            return cached.clone();
        }

        let loaded = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|font_res| font_res.get(name).ok())
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .map(|dict| Rc::new(LoadedFont::load(self.doc, dict)));

        if let Some(font) = &loaded
            && !font.has_program()
            && self.warned_fonts.insert(font.base_name.clone())
        {
            warn!(font = %font.base_name, "no embedded font program; glyphs will not be painted");
        }

        fonts.insert(name.to_vec(), loaded.clone());
        loaded
    }

    // -- XObjects -------------------------------------------------------------

    fn run_xobject(
        &mut self,
        name: &[u8],
        resources: &Dictionary,
        visited_forms: &mut HashSet<ObjectId>,
    ) -> Result<()> {
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return Ok(());
        };
        let Ok(entry) = xobjects.get(name) else {
            return Ok(());
        };
        let form_id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Some(stream) = resolve(self.doc, entry).and_then(|obj| obj.as_stream().ok()) else {
            return Ok(());
        };

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|obj| match obj {
            Object::Name(name) => Some(name.as_slice()),
            _ => None,
        });

        match subtype {
            Some(b"Image") => self.draw_image(stream),
            Some(b"Form") => self.run_form(stream, form_id, resources, visited_forms),
            _ => Ok(()),
        }
    }

    fn run_form(
        &mut self,
        stream: &Stream,
        form_id: Option<ObjectId>,
        parent_resources: &Dictionary,
        visited_forms: &mut HashSet<ObjectId>,
    ) -> Result<()> {
        if let Some(id) = form_id {
            // A form drawing itself would never terminate.
            if !visited_forms.insert(id) {
                return Ok(());
            }
        }

        let content_bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = Content::decode(&content_bytes)
            .map_err(|err| BinderyError::Render(format!("undecodable form content: {err}")))?;

        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(|| parent_resources.clone());

        // Execute within a saved state; the /Matrix maps form space into the
        // current user space.
        self.stack.push(self.state.clone());
        let saved_text = (self.text_matrix, self.line_matrix);
        if let Some(matrix) = matrix_from_dict(self.doc, &stream.dict) {
            self.state.ctm = self.state.ctm.pre_concat(matrix);
        }

        let result = self.execute(&content.operations, &resources, visited_forms);

        (self.text_matrix, self.line_matrix) = saved_text;
        if let Some(previous) = self.stack.pop() {
            self.state = previous;
        }
        if let Some(id) = form_id {
            visited_forms.remove(&id);
        }
        result
    }

    fn draw_image(&mut self, stream: &Stream) -> Result<()> {
        // Stencil masks paint nothing by themselves; skip rather than fail.
        if let Ok(mask) = stream.dict.get(b"ImageMask")
            && mask.as_bool().unwrap_or(false)
        {
            warn!("stencil image mask skipped");
            return Ok(());
        }

        let (width, height, rgba) = decode_image_xobject(self.doc, stream)?;
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| BinderyError::Render("image with zero dimension".into()))?;
        let image = Pixmap::from_vec(rgba, size)
            .ok_or_else(|| BinderyError::Render("image buffer shape mismatch".into()))?;

        // Image space: unit square, row 0 at the top.
        let transform = self.device_transform().pre_concat(Transform::from_row(
            1.0 / width as f32,
            0.0,
            0.0,
            -1.0 / height as f32,
            0.0,
            1.0,
        ));

        let paint = PixmapPaint {
            opacity: self.state.fill_alpha,
            quality: tiny_skia::FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &paint,
            transform,
            self.state.clip.as_ref(),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Image XObject decoding
// ---------------------------------------------------------------------------

/// Decode an image XObject into premultiplied RGBA pixels.
fn decode_image_xobject(doc: &Document, stream: &Stream) -> Result<(u32, u32, Vec<u8>)> {
    let width = dict_u32(doc, &stream.dict, b"Width")
        .ok_or_else(|| BinderyError::Render("image without width".into()))?;
    let height = dict_u32(doc, &stream.dict, b"Height")
        .ok_or_else(|| BinderyError::Render("image without height".into()))?;

    let filters = filter_names(&stream.dict);
    let (width, height, rgba) = if filters.iter().any(|f| f == "DCTDecode" || f == "JPXDecode") {
        let decoded = image::load_from_memory(&stream.content).map_err(|err| {
            BinderyError::Render(format!("embedded image failed to decode: {err}"))
        })?;
        // Trust the codec's dimensions over the dictionary's.
        let rgba = decoded.to_rgba8();
        let (w, h) = rgba.dimensions();
        (w, h, rgba.into_raw())
    } else {
        let data = if filters.iter().any(|f| f == "FlateDecode") {
            stream
                .decompressed_content()
                .map_err(|err| BinderyError::Render(format!("image stream inflate: {err}")))?
        } else if filters.is_empty() {
            stream.content.clone()
        } else {
            return Err(BinderyError::Render(format!(
                "unsupported image filter {:?}",
                filters
            )));
        };

        let bits = dict_u32(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
        if bits != 8 {
            return Err(BinderyError::Render(format!(
                "unsupported image depth: {bits} bits per component"
            )));
        }
        let components = color_components(doc, &stream.dict, data.len(), width, height)?;
        (width, height, raw_to_rgba(&data, width, height, components)?)
    };

    let mut rgba = rgba;
    apply_soft_mask(doc, stream, width, height, &mut rgba);
    premultiply(&mut rgba);
    Ok((width, height, rgba))
}

/// Expand raw component data into straight-alpha RGBA.
fn raw_to_rgba(data: &[u8], width: u32, height: u32, components: usize) -> Result<Vec<u8>> {
    let pixels = width as usize * height as usize;
    if data.len() < pixels * components {
        return Err(BinderyError::Render(format!(
            "image data too short: {} bytes for {}x{}x{}",
            data.len(),
            width,
            height,
            components
        )));
    }

    let mut rgba = Vec::with_capacity(pixels * 4);
    match components {
        1 => {
            for &gray in &data[..pixels] {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
        }
        3 => {
            for px in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        4 => {
            for px in data[..pixels * 4].chunks_exact(4) {
                let [r, g, b] = cmyk_to_rgb(
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                    px[3] as f32 / 255.0,
                );
                rgba.extend_from_slice(&[
                    (r * 255.0) as u8,
                    (g * 255.0) as u8,
                    (b * 255.0) as u8,
                    255,
                ]);
            }
        }
        other => {
            return Err(BinderyError::Render(format!(
                "unsupported colour component count: {other}"
            )));
        }
    }
    Ok(rgba)
}

/// Merge an /SMask grayscale plane into the alpha channel.
fn apply_soft_mask(doc: &Document, stream: &Stream, width: u32, height: u32, rgba: &mut [u8]) {
    let Some(mask_stream) = stream
        .dict
        .get(b"SMask")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_stream().ok())
    else {
        return;
    };
    let Ok(alpha) = mask_stream.decompressed_content() else {
        warn!("soft mask could not be inflated; image treated as opaque");
        return;
    };
    let pixels = width as usize * height as usize;
    if alpha.len() < pixels {
        warn!("soft mask smaller than image; ignored");
        return;
    }
    for (pixel, &a) in rgba.chunks_exact_mut(4).zip(alpha.iter()) {
        pixel[3] = a;
    }
}

fn premultiply(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let alpha = pixel[3] as u16;
        if alpha != 255 {
            pixel[0] = ((pixel[0] as u16 * alpha) / 255) as u8;
            pixel[1] = ((pixel[1] as u16 * alpha) / 255) as u8;
            pixel[2] = ((pixel[2] as u16 * alpha) / 255) as u8;
        }
    }
}

/// Number of colour components for an image, from /ColorSpace with a size
/// heuristic for ICC-based spaces.
fn color_components(
    doc: &Document,
    dict: &Dictionary,
    data_len: usize,
    width: u32,
    height: u32,
) -> Result<usize> {
    let pixels = width as usize * height as usize;
    let space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|obj| resolve(doc, obj));

    let name = match space {
        Some(Object::Name(name)) => name.clone(),
        Some(Object::Array(items)) => {
            match items.first() {
                Some(Object::Name(name)) if name == b"ICCBased" => {
                    // /N on the ICC stream gives the component count.
                    if let Some(n) = items
                        .get(1)
                        .and_then(|obj| resolve(doc, obj))
                        .and_then(|obj| obj.as_stream().ok())
                        .and_then(|icc| icc.dict.get(b"N").ok())
                        .and_then(|obj| obj.as_i64().ok())
                    {
                        return Ok(n as usize);
                    }
                    // Fall back to what the data can hold.
                    return Ok(if pixels > 0 && data_len / pixels >= 3 { 3 } else { 1 });
                }
                Some(Object::Name(name)) => name.clone(),
                _ => b"DeviceRGB".to_vec(),
            }
        }
        _ => b"DeviceRGB".to_vec(),
    };

    match name.as_slice() {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(3),
        b"DeviceCMYK" | b"CMYK" => Ok(4),
        other => Err(BinderyError::Render(format!(
            "unsupported colour space: {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|obj| match obj {
                Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Page attribute helpers
// ---------------------------------------------------------------------------

/// MediaBox of a page, inherited through /Parent, as `[x0, y0, x1, y1]`.
fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut dict_id = page_id;
    for _ in 0..64 {
        let Ok(dict) = doc.get_dictionary(dict_id) else {
            break;
        };
        if let Ok(rect) = dict.get(b"MediaBox")
            && let Some(Object::Array(items)) = resolve(doc, rect)
            && items.len() == 4
        {
            let mut coords = [0.0f32; 4];
            let mut valid = true;
            for (slot, item) in coords.iter_mut().zip(items) {
                match resolve(doc, item).and_then(number) {
                    Some(value) => *slot = value,
                    None => valid = false,
                }
            }
            if valid {
                return coords;
            }
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => dict_id = *parent,
            _ => break,
        }
    }
    warn!(?page_id, "page has no usable MediaBox, assuming Letter");
    DEFAULT_MEDIA_BOX
}

/// /Resources of a page, inherited through /Parent. Returns an empty
/// dictionary when none is declared.
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut dict_id = page_id;
    for _ in 0..64 {
        let Ok(dict) = doc.get_dictionary(dict_id) else {
            break;
        };
        if let Ok(resources) = dict.get(b"Resources")
            && let Some(resolved) = resolve(doc, resources)
            && let Ok(resources) = resolved.as_dict()
        {
            return resources.clone();
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => dict_id = *parent,
            _ => break,
        }
    }
    Dictionary::new()
}

fn matrix_from_dict(doc: &Document, dict: &Dictionary) -> Option<Transform> {
    let array = match resolve(doc, dict.get(b"Matrix").ok()?)? {
        Object::Array(items) if items.len() == 6 => items,
        _ => return None,
    };
    let mut values = [0.0f32; 6];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = resolve(doc, item).and_then(number)?;
    }
    Some(Transform::from_row(
        values[0], values[1], values[2], values[3], values[4], values[5],
    ))
}

// ---------------------------------------------------------------------------
// Operand and colour helpers
// ---------------------------------------------------------------------------

/// First N operands as numbers, or None if any is missing or non-numeric.
fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0f32; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(values)
}

fn name_operand(operands: &[Object], index: usize) -> Option<Vec<u8>> {
    match operands.get(index) {
        Some(Object::Name(name)) => Some(name.clone()),
        _ => None,
    }
}

/// Colour from a generic sc/scn operand list, by component count.
fn generic_color(operands: &[Object]) -> Option<[f32; 3]> {
    let values: Vec<f32> = operands.iter().filter_map(number).collect();
    match values.len() {
        1 => Some([values[0], values[0], values[0]]),
        3 => Some([values[0], values[1], values[2]]),
        4 => Some(cmyk_to_rgb(values[0], values[1], values[2], values[3])),
        _ => None,
    }
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> [f32; 3] {
    [
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    ]
}

fn rgb_color(rgb: [f32; 3], alpha: f32) -> Color {
    Color::from_rgba(
        rgb[0].clamp(0.0, 1.0),
        rgb[1].clamp(0.0, 1.0),
        rgb[2].clamp(0.0, 1.0),
        alpha.clamp(0.0, 1.0),
    )
    .unwrap_or(Color::BLACK)
}

fn dict_u32(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .map(|value| value.max(0) as u32)
}
