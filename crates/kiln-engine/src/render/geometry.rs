//! Shape encoders: expand high-level shapes into [`InstanceRecord`]s.
//!
//! Every instanced shape is the unit quad `[0,1]²` pushed through a transform
//! matrix. Texel rectangles are normalized against the texture currently
//! bound to unit 0.

use std::collections::HashMap;

use crate::coords::{Color, Rect, Vec2};

use super::record::InstanceRecord;
use super::state::Texture;

/// Builds `translate(rect.origin) · [rotate about size/2 + pivot] · scale(rect.size)`.
///
/// `rotation` is in radians; `pivot` is an offset from the rect's centre in
/// the same units as `rect`.
pub fn sprite_transform(rect: Rect, rotation: f32, pivot: Vec2) -> glam::Mat4 {
    let translate =
        glam::Mat4::from_translation(glam::Vec3::new(rect.origin.x, rect.origin.y, 0.0));
    let scale = glam::Mat4::from_scale(glam::Vec3::new(rect.size.x, rect.size.y, 1.0));

    if rotation == 0.0 {
        return translate * scale;
    }

    let c = rect.size * 0.5 + pivot;
    let to_pivot = glam::Mat4::from_translation(glam::Vec3::new(c.x, c.y, 0.0));
    let from_pivot = glam::Mat4::from_translation(glam::Vec3::new(-c.x, -c.y, 0.0));
    let rotate = glam::Mat4::from_rotation_z(rotation);

    translate * to_pivot * rotate * from_pivot * scale
}

/// Normalizes a texel rect against `texture`. `None` selects the whole texture.
#[inline]
pub fn normalized_tex_rect(src: Option<Rect>, texture: Texture) -> Rect {
    match src {
        None => Rect::new(0.0, 0.0, 1.0, 1.0),
        Some(r) => r.normalized_by(Vec2::new(texture.width as f32, texture.height as f32)),
    }
}

/// Encodes one sprite.
pub fn sprite_instance(
    rect: Rect,
    rotation: f32,
    pivot: Vec2,
    color: Color,
    src: Option<Rect>,
    texture: Texture,
) -> InstanceRecord {
    InstanceRecord::new(
        sprite_transform(rect, rotation, pivot),
        color,
        normalized_tex_rect(src, texture),
    )
}

/// Encodes the bounding square of a circle. The round edge comes from the shader.
pub fn circle_instance(
    center: Vec2,
    radius: f32,
    color: Color,
    src: Option<Rect>,
    texture: Texture,
) -> InstanceRecord {
    sprite_instance(Rect::around(center, radius), 0.0, Vec2::ZERO, color, src, texture)
}

// ── text ──────────────────────────────────────────────────────────────────

/// Metrics of one glyph in an atlas, in unscaled atlas pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Glyph {
    /// Horizontal pen advance after this glyph.
    pub advance: f32,
    /// Offset of the glyph quad from the pen position.
    pub offset: Vec2,
    /// Source region in the atlas texture.
    pub texel_rect: Rect,
}

/// Font metrics provider consumed by [`text_instances`].
pub trait GlyphSource {
    fn glyph(&self, ch: char) -> Option<Glyph>;

    /// Distance between baselines, unscaled.
    fn line_height(&self) -> f32;
}

/// Fixed glyph table for a prebuilt atlas.
#[derive(Debug, Clone, Default)]
pub struct GlyphTable {
    glyphs: HashMap<char, Glyph>,
    line_height: f32,
}

impl GlyphTable {
    pub fn new(line_height: f32) -> Self {
        Self { glyphs: HashMap::new(), line_height }
    }

    pub fn insert(&mut self, ch: char, glyph: Glyph) {
        self.glyphs.insert(ch, glyph);
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl GlyphSource for GlyphTable {
    fn glyph(&self, ch: char) -> Option<Glyph> {
        self.glyphs.get(&ch).copied()
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }
}

/// A run of text to lay out left-to-right.
#[derive(Debug, Copy, Clone)]
pub struct TextRun<'a> {
    pub text: &'a str,
    /// Top-left of the first line's pen.
    pub origin: Vec2,
    pub scale: f32,
    /// Radians, applied around the run's bounding-box centre plus `pivot`.
    pub rotation: f32,
    pub pivot: Vec2,
    pub color: Color,
}

impl<'a> TextRun<'a> {
    pub fn new(text: &'a str, origin: Vec2, color: Color) -> Self {
        Self {
            text,
            origin,
            scale: 1.0,
            rotation: 0.0,
            pivot: Vec2::ZERO,
            color,
        }
    }
}

/// Size of the laid-out run: widest line by number of lines.
pub fn measure_text(text: &str, glyphs: &dyn GlyphSource, scale: f32) -> Vec2 {
    let mut pen_x = 0.0f32;
    let mut width = 0.0f32;
    let mut lines = 1u32;

    for ch in text.chars() {
        if ch == '\n' {
            lines += 1;
            pen_x = 0.0;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        if let Some(g) = glyphs.glyph(ch) {
            pen_x += g.advance * scale;
            width = width.max(pen_x);
        }
    }

    Vec2::new(width, lines as f32 * glyphs.line_height() * scale)
}

/// Lays out `run` and appends one instance per drawable code point to `out`.
///
/// Each glyph's pivot is shifted so the whole run rotates as one block.
/// Code points without a glyph are skipped without advancing the pen.
/// Returns the number of instances appended.
pub fn text_instances(
    run: &TextRun<'_>,
    glyphs: &dyn GlyphSource,
    texture: Texture,
    out: &mut Vec<InstanceRecord>,
) -> usize {
    let run_half = measure_text(run.text, glyphs, run.scale) * 0.5;
    let line_advance = glyphs.line_height() * run.scale;
    let before = out.len();

    let mut pen = run.origin;
    for ch in run.text.chars() {
        if ch == '\n' {
            pen.x = run.origin.x;
            pen.y += line_advance;
            continue;
        }
        if ch.is_control() {
            continue;
        }
        let Some(g) = glyphs.glyph(ch) else {
            log::trace!("no glyph for {ch:?}, skipped");
            continue;
        };

        let pos = pen + g.offset * run.scale;
        let size = g.texel_rect.size * run.scale;
        let half = size * 0.5;
        let pivot = run.pivot + run.origin + run_half - pos - half;

        out.push(sprite_instance(
            Rect::from_origin_size(pos, size),
            run.rotation,
            pivot,
            run.color,
            Some(g.texel_rect),
            texture,
        ));

        pen.x += g.advance * run.scale;
    }

    out.len() - before
}
