//! Test backends: a call recorder and a tiny software rasterizer.

use std::collections::HashMap;
use std::ops::Range;

use crate::coords::{PixelRect, SurfaceSize};

use super::backend::GpuBackend;
use super::record::{InstanceRecord, VertexRecord};
use super::state::{
    BlendFactor, BlendMode, FLAGS_UNIFORM, PROJECTION_UNIFORM, ShaderId, TextureBinding, Topology,
    UniformValue, VertexMode,
};

/// One backend call, with uploads reduced to their lengths.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    UploadInstances(usize),
    UploadVertices(usize),
    SetViewport(PixelRect),
    SetScissor(Option<PixelRect>),
    BindShader(ShaderId),
    SetBlend(BlendMode),
    BindTexture(TextureBinding),
    SetUniform(String, UniformValue),
    BindVertexLayout(VertexMode),
    DrawInstanced(Topology, Range<u32>),
    DrawVertices(Topology, Range<u32>),
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<GpuCall>,
}

impl GpuBackend for RecordingBackend {
    fn upload_instances(&mut self, instances: &[InstanceRecord]) {
        self.calls.push(GpuCall::UploadInstances(instances.len()));
    }

    fn upload_vertices(&mut self, vertices: &[VertexRecord]) {
        self.calls.push(GpuCall::UploadVertices(vertices.len()));
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.calls.push(GpuCall::SetViewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.calls.push(GpuCall::SetScissor(rect));
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.calls.push(GpuCall::BindShader(shader));
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.calls.push(GpuCall::SetBlend(blend));
    }

    fn bind_texture(&mut self, binding: TextureBinding) {
        self.calls.push(GpuCall::BindTexture(binding));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.calls.push(GpuCall::SetUniform(name.to_owned(), value));
    }

    fn bind_vertex_layout(&mut self, mode: VertexMode) {
        self.calls.push(GpuCall::BindVertexLayout(mode));
    }

    fn draw_instanced(&mut self, topology: Topology, instances: Range<u32>) {
        self.calls.push(GpuCall::DrawInstanced(topology, instances));
    }

    fn draw_vertices(&mut self, topology: Topology, vertices: Range<u32>) {
        self.calls.push(GpuCall::DrawVertices(topology, vertices));
    }
}

// ── software rasterizer ───────────────────────────────────────────────────

/// Optional `vec4` multiplied into every fragment.
pub const TINT_UNIFORM: &str = "u_tint";

/// Pixel-center rasterizer for instanced quads and point lists.
///
/// Textures are ignored (everything samples white). Shading honours the
/// blend pair, scissor, viewport, premultiply flag, [`TINT_UNIFORM`], and
/// [`ShaderId::CIRCLE`] coverage. Uniforms are stored per shader, like GL
/// program state.
#[derive(Debug)]
pub struct SoftRaster {
    pub surface: SurfaceSize,
    pub pixels: Vec<[f32; 4]>,
    instances: Vec<InstanceRecord>,
    vertices: Vec<VertexRecord>,
    /// Top-left origin, converted back from the GPU convention.
    viewport: PixelRect,
    scissor: Option<PixelRect>,
    shader: ShaderId,
    blend: BlendMode,
    uniforms: HashMap<ShaderId, HashMap<String, UniformValue>>,
}

impl SoftRaster {
    pub fn new(surface: SurfaceSize) -> Self {
        Self {
            surface,
            pixels: vec![[0.0; 4]; (surface.width * surface.height) as usize],
            instances: Vec::new(),
            vertices: Vec::new(),
            viewport: surface.full_rect(),
            scissor: None,
            shader: ShaderId::DEFAULT,
            blend: BlendMode::default(),
            uniforms: HashMap::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.surface.width + x) as usize]
    }

    /// Sets a top-left viewport as given, even where it hangs past the
    /// surface; fragments outside the surface are dropped.
    pub fn set_viewport_unclamped(&mut self, rect: PixelRect) {
        self.viewport = rect;
    }

    fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms.get(&self.shader)?.get(name).copied()
    }

    fn projection(&self) -> glam::Mat4 {
        match self.uniform(PROJECTION_UNIFORM) {
            Some(UniformValue::Mat4(m)) => glam::Mat4::from_cols_array_2d(&m),
            _ => glam::Mat4::IDENTITY,
        }
    }

    fn flags(&self) -> [f32; 4] {
        match self.uniform(FLAGS_UNIFORM) {
            Some(UniformValue::Vec4(v)) => v,
            _ => [0.0; 4],
        }
    }

    fn tint(&self) -> [f32; 4] {
        match self.uniform(TINT_UNIFORM) {
            Some(UniformValue::Vec4(v)) => v,
            _ => [1.0; 4],
        }
    }

    /// Pixels allowed by surface, viewport and scissor, in top-left coordinates.
    fn clip(&self) -> PixelRect {
        let vp = self.viewport.clamped_to(self.surface);
        match self.scissor {
            None => vp,
            Some(s) => {
                let x0 = vp.x.max(s.x);
                let y0 = vp.y.max(s.y);
                let x1 = (vp.x + vp.width).min(s.x + s.width);
                let y1 = (vp.y + vp.height).min(s.y + s.height);
                PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
            }
        }
    }

    /// Pixel center → NDC for the current viewport.
    fn to_ndc(&self, px: u32, py: u32) -> glam::Vec3 {
        let vp = self.viewport;
        let x = (px as f32 + 0.5 - vp.x as f32) / vp.width as f32 * 2.0 - 1.0;
        let y = 1.0 - (py as f32 + 0.5 - vp.y as f32) / vp.height as f32 * 2.0;
        glam::Vec3::new(x, y, 0.5)
    }

    /// NDC → top-left pixel for the current viewport.
    fn to_pixel(&self, ndc: glam::Vec3) -> Option<(u32, u32)> {
        let vp = self.viewport;
        let x = vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32;
        let y = vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.height as f32;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        Some((x.floor() as u32, y.floor() as u32))
    }

    fn shade(&self, color: [f32; 4]) -> [f32; 4] {
        let tint = self.tint();
        let mut c = [0.0; 4];
        for i in 0..4 {
            c[i] = color[i] * tint[i];
        }
        if self.flags()[0] > 0.5 {
            for ch in c.iter_mut().take(3) {
                *ch *= color[3] * tint[3];
            }
        }
        c
    }

    fn blend_into(&mut self, x: u32, y: u32, src: [f32; 4]) {
        let clip = self.clip();
        if x < clip.x || y < clip.y || x >= clip.x + clip.width || y >= clip.y + clip.height {
            return;
        }
        let idx = (y * self.surface.width + x) as usize;
        let dst = self.pixels[idx];
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = src[i] * factor(self.blend.src, i, src, dst)
                + dst[i] * factor(self.blend.dst, i, src, dst);
        }
        self.pixels[idx] = out;
    }
}

fn factor(f: BlendFactor, channel: usize, src: [f32; 4], dst: [f32; 4]) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcColor => src[channel],
        BlendFactor::OneMinusSrcColor => 1.0 - src[channel],
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFactor::DstColor => dst[channel],
        BlendFactor::OneMinusDstColor => 1.0 - dst[channel],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 1.0 - dst[3],
    }
}

impl GpuBackend for SoftRaster {
    fn upload_instances(&mut self, instances: &[InstanceRecord]) {
        self.instances = instances.to_vec();
    }

    fn upload_vertices(&mut self, vertices: &[VertexRecord]) {
        self.vertices = vertices.to_vec();
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.viewport = rect.to_gpu(self.surface);
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.scissor = rect.map(|r| r.to_gpu(self.surface));
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        self.shader = shader;
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.blend = blend;
    }

    fn bind_texture(&mut self, _binding: TextureBinding) {}

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.uniforms
            .entry(self.shader)
            .or_default()
            .insert(name.to_owned(), value);
    }

    fn bind_vertex_layout(&mut self, _mode: VertexMode) {}

    fn draw_instanced(&mut self, _topology: Topology, instances: Range<u32>) {
        let projection = self.projection();
        let clip = self.clip();
        let circle = self.shader == ShaderId::CIRCLE;

        for i in instances {
            let inst = self.instances[i as usize];
            let inverse = (projection * inst.matrix()).inverse();
            let color = self.shade(inst.color);

            for py in clip.y..clip.y + clip.height {
                for px in clip.x..clip.x + clip.width {
                    let local = inverse.transform_point3(self.to_ndc(px, py));
                    if !(0.0..1.0).contains(&local.x) || !(0.0..1.0).contains(&local.y) {
                        continue;
                    }
                    if circle {
                        let d = glam::Vec2::new(local.x - 0.5, local.y - 0.5).length();
                        if d > 0.5 {
                            continue;
                        }
                    }
                    self.blend_into(px, py, color);
                }
            }
        }
    }

    fn draw_vertices(&mut self, topology: Topology, vertices: Range<u32>) {
        assert_eq!(topology, Topology::Points, "SoftRaster only rasterizes point lists");
        let projection = self.projection();

        for i in vertices {
            let v = self.vertices[i as usize];
            let ndc = projection.project_point3(glam::Vec3::new(v.pos[0], v.pos[1], 0.0));
            let color = self.shade(v.color);
            if let Some((px, py)) = self.to_pixel(ndc) {
                self.blend_into(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, Rect, Space, Vec2};
    use crate::render::batch::BatchScheduler;
    use crate::render::geometry::{circle_instance, sprite_instance};
    use crate::render::state::{DrawState, Texture, TextureId, projection_matrix};

    const SURFACE: SurfaceSize = SurfaceSize::new(32, 24);
    const ATLAS: Texture = Texture::new(TextureId(7), 64, 64);

    /// One step of a drawing script.
    #[derive(Debug, Clone, Copy)]
    enum Op {
        Projection(Space),
        Viewport(Option<PixelRect>),
        Texture(u8, Texture),
        Flush,
        Shader(ShaderId),
        Blend(BlendMode),
        Scissor(Option<PixelRect>),
        Premultiply(bool),
        Tint([f32; 4]),
        Mode(VertexMode),
        Sprite(Rect, f32, Color),
        Circle(Vec2, f32, Color),
        Point(Vec2, Color),
    }

    fn script() -> Vec<Op> {
        vec![
            Op::Projection(Space::from_xywh(0.0, 0.0, 16.0, 12.0)),
            Op::Sprite(Rect::new(1.0, 1.0, 6.0, 4.0), 0.0, Color::new(0.5, 0.0, 0.0, 0.5)),
            Op::Sprite(Rect::new(4.0, 2.0, 6.0, 6.0), 0.3, Color::new(0.0, 0.25, 0.0, 0.25)),
            Op::Blend(BlendMode::ADDITIVE),
            Op::Sprite(Rect::new(0.0, 0.0, 16.0, 12.0), 0.0, Color::new(0.1, 0.1, 0.1, 0.1)),
            Op::Blend(BlendMode::ALPHA),
            Op::Shader(ShaderId::CIRCLE),
            Op::Circle(Vec2::new(10.0, 6.0), 4.0, Color::new(0.0, 0.0, 1.0, 0.75)),
            Op::Shader(ShaderId::DEFAULT),
            Op::Texture(1, ATLAS),
            Op::Sprite(Rect::new(12.0, 9.0, 3.0, 2.0), 0.0, Color::new(0.3, 0.3, 0.0, 0.3)),
            Op::Flush,
            // Hangs 16 px past the right edge; world x 0..8 stays visible.
            Op::Viewport(Some(PixelRect::new(16, 0, 32, 24))),
            Op::Sprite(Rect::new(1.0, 1.0, 6.0, 4.0), 0.0, Color::new(0.0, 0.4, 0.4, 0.4)),
            Op::Sprite(Rect::new(5.0, 6.0, 8.0, 4.0), 0.0, Color::new(0.2, 0.0, 0.2, 0.2)),
            Op::Viewport(Some(PixelRect::new(0, 12, 16, 12))),
            Op::Sprite(Rect::new(2.0, 2.0, 6.0, 6.0), 0.0, Color::new(0.0, 0.0, 0.6, 0.6)),
            Op::Viewport(None),
            Op::Scissor(Some(PixelRect::new(0, 0, 16, 12))),
            Op::Tint([1.0, 0.5, 0.5, 1.0]),
            Op::Sprite(Rect::new(2.0, 2.0, 12.0, 8.0), 0.0, Color::new(0.8, 0.8, 0.8, 0.5)),
            Op::Tint([0.5, 0.5, 1.0, 1.0]),
            Op::Sprite(Rect::new(6.0, 6.0, 8.0, 4.0), 0.0, Color::new(0.8, 0.8, 0.8, 0.5)),
            Op::Scissor(None),
            Op::Premultiply(true),
            Op::Blend(BlendMode::PREMULTIPLIED),
            Op::Sprite(Rect::new(8.0, 0.0, 8.0, 12.0), -0.4, Color::new(1.0, 1.0, 0.0, 0.3)),
            Op::Mode(VertexMode::Vertices),
            Op::Point(Vec2::new(3.2, 9.7), Color::WHITE),
            Op::Point(Vec2::new(12.6, 1.1), Color::new(0.0, 1.0, 1.0, 1.0)),
            Op::Mode(VertexMode::Instanced),
            Op::Sprite(Rect::new(0.0, 8.0, 4.0, 4.0), 0.0, Color::new(0.2, 0.2, 0.2, 0.2)),
        ]
    }

    fn batched(ops: &[Op]) -> SoftRaster {
        let mut raster = SoftRaster::new(SURFACE);
        let mut b = BatchScheduler::new();
        for op in ops {
            match *op {
                Op::Projection(s) => b.set_projection(s),
                Op::Viewport(v) => b.set_viewport(v),
                Op::Texture(unit, t) => b.set_texture(unit, t),
                Op::Flush => {
                    b.flush(&mut raster, SURFACE);
                }
                Op::Shader(s) => b.set_shader(s),
                Op::Blend(m) => b.set_blend(m),
                Op::Scissor(Some(r)) => b.set_scissor(r),
                Op::Scissor(None) => b.clear_scissor(),
                Op::Premultiply(on) => b.set_premultiply_alpha(on),
                Op::Tint(t) => b.push_uniform(TINT_UNIFORM, t),
                Op::Mode(m) => {
                    b.set_mode(m);
                    if m == VertexMode::Vertices {
                        b.set_topology(Topology::Points);
                    }
                }
                Op::Sprite(r, rot, c) => b.cache_sprite(r, rot, Vec2::ZERO, c, None),
                Op::Circle(center, radius, c) => b.cache_circle(center, radius, c, None),
                Op::Point(p, c) => b.cache_vertices(&[VertexRecord::colored(p, c)]),
            }
        }
        b.flush(&mut raster, SURFACE);
        raster
    }

    fn apply(raster: &mut SoftRaster, state: &DrawState, tint: Option<[f32; 4]>) {
        let viewport = state.viewport.unwrap_or(SURFACE.full_rect());
        let projection = state.projection.unwrap_or_else(|| Space::from(viewport));

        raster.set_viewport_unclamped(viewport);
        raster.set_scissor(state.scissor.map(|r| r.to_gpu(SURFACE)));
        raster.bind_shader(state.shader);
        raster.set_blend(state.blend);
        raster.set_uniform(PROJECTION_UNIFORM, projection_matrix(projection).into());
        raster.set_uniform(FLAGS_UNIFORM, UniformValue::Vec4(state.flags.to_uniform()));
        raster.set_uniform(TINT_UNIFORM, UniformValue::Vec4(tint.unwrap_or([1.0; 4])));
    }

    /// Draws every primitive on its own, straight on the backend.
    fn one_draw_per_shape(ops: &[Op]) -> SoftRaster {
        let mut raster = SoftRaster::new(SURFACE);
        let mut state = DrawState::default();
        let mut tint = None;

        for op in ops {
            match *op {
                Op::Projection(s) => state.projection = Some(s),
                Op::Viewport(v) => state.viewport = v,
                // Textures are not sampled and a flush leaves no visible trace.
                Op::Texture(..) | Op::Flush => {}
                Op::Shader(s) => state.shader = s,
                Op::Blend(m) => state.blend = m,
                Op::Scissor(s) => state.scissor = s,
                Op::Premultiply(on) => state.flags.premultiply_alpha = on,
                Op::Tint(t) => tint = Some(t),
                Op::Mode(_) => {}
                Op::Sprite(r, rot, c) => {
                    let inst = sprite_instance(r, rot, Vec2::ZERO, c, None, Texture::WHITE);
                    raster.upload_instances(&[inst]);
                    apply(&mut raster, &state, tint);
                    raster.draw_instanced(Topology::Triangles, 0..1);
                }
                Op::Circle(center, radius, c) => {
                    let inst = circle_instance(center, radius, c, None, Texture::WHITE);
                    raster.upload_instances(&[inst]);
                    apply(&mut raster, &state, tint);
                    raster.draw_instanced(Topology::Triangles, 0..1);
                }
                Op::Point(p, c) => {
                    raster.upload_vertices(&[VertexRecord::colored(p, c)]);
                    apply(&mut raster, &state, tint);
                    raster.draw_vertices(Topology::Points, 0..1);
                }
            }
        }
        raster
    }

    // ── semantic transparency ─────────────────────────────────────────────

    #[test]
    fn batching_matches_one_draw_per_shape() {
        let ops = script();
        let a = batched(&ops);
        let b = one_draw_per_shape(&ops);

        assert!(a.pixels.iter().any(|p| p[3] > 0.0), "script drew nothing");
        for y in 0..SURFACE.height {
            for x in 0..SURFACE.width {
                assert_eq!(a.pixel(x, y), b.pixel(x, y), "pixel ({x}, {y})");
            }
        }
    }

    // ── rasterizer sanity ─────────────────────────────────────────────────

    #[test]
    fn opaque_sprite_covers_its_pixels() {
        let mut b = BatchScheduler::new();
        b.cache_sprite(Rect::new(2.0, 3.0, 4.0, 2.0), 0.0, Vec2::ZERO, Color::WHITE, None);
        let mut raster = SoftRaster::new(SURFACE);
        b.flush(&mut raster, SURFACE);

        assert_eq!(raster.pixel(2, 3), [1.0; 4]);
        assert_eq!(raster.pixel(5, 4), [1.0; 4]);
        assert_eq!(raster.pixel(6, 4), [0.0; 4]);
        assert_eq!(raster.pixel(2, 5), [0.0; 4]);
    }

    #[test]
    fn unclamped_viewport_drops_offsurface_fragments() {
        let mut raster = SoftRaster::new(SURFACE);
        raster.set_viewport_unclamped(PixelRect::new(16, 0, 32, 24));
        raster.set_uniform(
            PROJECTION_UNIFORM,
            projection_matrix(Space::from_xywh(0.0, 0.0, 32.0, 24.0)).into(),
        );
        let wide = sprite_instance(
            Rect::new(0.0, 0.0, 32.0, 4.0),
            0.0,
            Vec2::ZERO,
            Color::WHITE,
            None,
            Texture::WHITE,
        );
        raster.upload_instances(&[wide]);
        raster.draw_instanced(Topology::Triangles, 0..1);

        assert_eq!(raster.pixel(15, 1), [0.0; 4]);
        assert_eq!(raster.pixel(16, 1), [1.0; 4]);
        assert_eq!(raster.pixel(31, 1), [1.0; 4]);
    }

    #[test]
    fn scissor_clips_fragments() {
        let mut b = BatchScheduler::new();
        b.set_scissor(PixelRect::new(0, 0, 4, 4));
        b.cache_sprite(Rect::new(0.0, 0.0, 8.0, 8.0), 0.0, Vec2::ZERO, Color::WHITE, None);
        let mut raster = SoftRaster::new(SURFACE);
        b.flush(&mut raster, SURFACE);

        assert_eq!(raster.pixel(3, 3), [1.0; 4]);
        assert_eq!(raster.pixel(4, 3), [0.0; 4]);
        assert_eq!(raster.pixel(3, 4), [0.0; 4]);
    }
}
