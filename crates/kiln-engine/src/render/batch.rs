//! Batch scheduler: accumulates geometry under a mutable draw state and
//! decides where batch boundaries fall.
//!
//! Storage is shared: every batch owns contiguous ranges into the instance,
//! vertex, texture-binding and uniform arrays. The last batch is always the
//! open one, so its ranges always end at the current array lengths and an
//! append only has to bump `range.end`.
//!
//! Boundary rule: a mutation is free while the open batch has no geometry.
//! Otherwise the open batch is closed and a copy of its state (bindings and
//! uniform overrides included) opens the next one before the mutation lands.

use std::borrow::Cow;
use std::ops::Range;

use crate::coords::{Color, PixelRect, Rect, Space, SurfaceSize, Vec2};

use super::backend::GpuBackend;
use super::flush::{self, FlushStats};
use super::geometry::{self, GlyphSource, TextRun};
use super::record::{InstanceRecord, VertexRecord};
use super::state::{
    BlendMode, DrawState, MAX_TEXTURE_UNITS, SamplerId, ShaderId, Texture, TextureBinding,
    Topology, UniformOverride, UniformValue, VertexMode,
};

/// Initial reservations for the per-frame arrays.
///
/// Arrays still grow past these on demand; the values only avoid early
/// reallocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub instance_capacity: usize,
    pub vertex_capacity: usize,
    pub batch_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            instance_capacity: 4096,
            vertex_capacity: 4096,
            batch_capacity: 64,
        }
    }
}

/// One draw call worth of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub state: DrawState,
    /// Indexes the instance array in instanced mode, the vertex array otherwise.
    pub primitives: Range<u32>,
    pub textures: Range<u32>,
    pub uniforms: Range<u32>,
}

impl Batch {
    fn open(state: DrawState, primitives: u32, textures: Range<u32>, uniforms: Range<u32>) -> Self {
        Self {
            state,
            primitives: primitives..primitives,
            textures,
            uniforms,
        }
    }

    #[inline]
    pub fn primitive_count(&self) -> u32 {
        self.primitives.end - self.primitives.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

/// Deferred 2D batcher.
///
/// ```ignore
/// let mut batcher = BatchScheduler::new();
/// batcher.set_projection(Space::from_xywh(0.0, 0.0, 320.0, 180.0));
/// batcher.cache_sprite(Rect::new(0.0, 0.0, 16.0, 16.0), 0.0, Vec2::ZERO, Color::WHITE, None);
/// batcher.set_shader(ShaderId::CIRCLE);
/// batcher.cache_circle(Vec2::new(100.0, 50.0), 8.0, Color::WHITE, None);
/// let stats = batcher.flush(&mut backend, surface);
/// assert_eq!(stats.draw_calls, 2);
/// ```
#[derive(Debug)]
pub struct BatchScheduler {
    batches: Vec<Batch>,
    instances: Vec<InstanceRecord>,
    vertices: Vec<VertexRecord>,
    textures: Vec<TextureBinding>,
    uniforms: Vec<UniformOverride>,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        let mut batches = Vec::with_capacity(config.batch_capacity.max(1));
        batches.push(Batch::open(DrawState::default(), 0, 0..1, 0..0));

        Self {
            batches,
            instances: Vec::with_capacity(config.instance_capacity),
            vertices: Vec::with_capacity(config.vertex_capacity),
            textures: vec![TextureBinding::DEFAULT],
            uniforms: Vec::new(),
        }
    }

    // ── read-only views ───────────────────────────────────────────────────

    /// All batches in submission order; the last one is still open.
    #[inline]
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    #[inline]
    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices
    }

    /// Texture bindings of `batch`, in binding order.
    pub fn batch_textures(&self, batch: &Batch) -> &[TextureBinding] {
        &self.textures[batch.textures.start as usize..batch.textures.end as usize]
    }

    /// Uniform overrides of `batch`, in push order.
    pub fn batch_uniforms(&self, batch: &Batch) -> &[UniformOverride] {
        &self.uniforms[batch.uniforms.start as usize..batch.uniforms.end as usize]
    }

    /// State that the next appended primitive will be drawn with.
    #[inline]
    pub fn state(&self) -> &DrawState {
        &self.open().state
    }

    /// Texture bound to `unit` in the open batch, if any.
    pub fn bound_texture(&self, unit: u8) -> Option<Texture> {
        self.batch_textures(self.open())
            .iter()
            .find(|b| b.unit == unit)
            .map(|b| b.texture)
    }

    /// `true` when nothing has been cached since the last flush.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.vertices.is_empty()
    }

    // ── state mutators ────────────────────────────────────────────────────

    pub fn set_projection(&mut self, space: Space) {
        self.state_mut().projection = Some(space);
    }

    /// Sets `space` grown to the aspect ratio of the current viewport (the
    /// full `surface` when no viewport is set). Returns the fitted space.
    pub fn set_projection_fit(&mut self, space: Space, surface: SurfaceSize) -> Space {
        let target = self.state().viewport.unwrap_or(surface.full_rect());
        let fitted = space.expand_to_aspect(target.size());
        self.set_projection(fitted);
        fitted
    }

    pub fn set_shader(&mut self, shader: ShaderId) {
        self.state_mut().shader = shader;
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.state_mut().blend = blend;
    }

    /// Top-left-origin pixel rect; `None` covers the whole surface.
    pub fn set_viewport(&mut self, viewport: Option<PixelRect>) {
        self.state_mut().viewport = viewport;
    }

    pub fn set_scissor(&mut self, scissor: PixelRect) {
        self.state_mut().scissor = Some(scissor);
    }

    pub fn clear_scissor(&mut self) {
        self.state_mut().scissor = None;
    }

    pub fn set_topology(&mut self, topology: Topology) {
        self.state_mut().topology = topology;
    }

    pub fn set_premultiply_alpha(&mut self, enabled: bool) {
        self.state_mut().flags.premultiply_alpha = enabled;
    }

    pub fn set_antialias(&mut self, enabled: bool) {
        self.state_mut().flags.antialias = enabled;
    }

    pub fn set_flip_tex(&mut self, flip_x: bool, flip_y: bool) {
        let flags = &mut self.state_mut().flags;
        flags.flip_tex_x = flip_x;
        flags.flip_tex_y = flip_y;
    }

    /// Switches between instanced quads and raw vertices.
    ///
    /// The two modes draw from different arrays, so the open batch's
    /// primitive range is re-anchored at the end of the new array.
    pub fn set_mode(&mut self, mode: VertexMode) {
        self.state_mut().mode = mode;
        let start = self.primitive_len(mode);
        self.open_mut().primitives = start..start;
    }

    /// Binds `texture` to `unit`, replacing any binding of that unit in the
    /// open batch. A new unit starts with [`SamplerId::LINEAR`].
    ///
    /// # Panics
    /// Panics if `unit >= MAX_TEXTURE_UNITS`.
    pub fn set_texture(&mut self, unit: u8, texture: Texture) {
        self.bind_unit(unit, |b| b.texture = texture);
    }

    /// Selects the sampler for `unit`. A new unit starts with [`Texture::WHITE`].
    ///
    /// # Panics
    /// Panics if `unit >= MAX_TEXTURE_UNITS`.
    pub fn set_sampler(&mut self, unit: u8, sampler: SamplerId) {
        self.bind_unit(unit, |b| b.sampler = sampler);
    }

    /// Appends a uniform override. Earlier overrides with the same name are
    /// kept and replayed first, so the last push wins on the GPU.
    pub fn push_uniform(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<UniformValue>,
    ) {
        self.prepare_mutation();
        self.uniforms.push(UniformOverride {
            name: name.into(),
            value: value.into(),
        });
        self.open_mut().uniforms.end += 1;
    }

    /// Closes the open batch even if it is empty.
    ///
    /// Keeps consecutive line loops or strips from being joined into one draw.
    pub fn break_batch(&mut self) {
        self.split();
    }

    // ── geometry ──────────────────────────────────────────────────────────

    /// Caches one sprite. `src` is a texel rect in the texture bound to unit 0
    /// (`None` for the whole texture); `pivot` offsets the rotation centre
    /// from the rect centre.
    ///
    /// # Panics
    /// Panics if the current mode is not [`VertexMode::Instanced`].
    pub fn cache_sprite(
        &mut self,
        rect: Rect,
        rotation: f32,
        pivot: Vec2,
        color: Color,
        src: Option<Rect>,
    ) {
        let texture = self.unit0_texture();
        self.cache_instance(geometry::sprite_instance(rect, rotation, pivot, color, src, texture));
    }

    /// Caches a circle as its bounding square. Bind [`ShaderId::CIRCLE`] (or
    /// a custom shader) to get the round edge.
    ///
    /// # Panics
    /// Panics if the current mode is not [`VertexMode::Instanced`].
    pub fn cache_circle(&mut self, center: Vec2, radius: f32, color: Color, src: Option<Rect>) {
        let texture = self.unit0_texture();
        self.cache_instance(geometry::circle_instance(center, radius, color, src, texture));
    }

    /// Lays out `run` against the atlas bound to unit 0. Returns the number of
    /// glyph quads cached.
    ///
    /// # Panics
    /// Panics if the current mode is not [`VertexMode::Instanced`].
    pub fn cache_text(&mut self, run: &TextRun<'_>, glyphs: &dyn GlyphSource) -> usize {
        self.assert_mode(VertexMode::Instanced, "cache_text");
        let texture = self.unit0_texture();
        let added = geometry::text_instances(run, glyphs, texture, &mut self.instances);
        self.open_mut().primitives.end += added as u32;
        added
    }

    /// Caches a prebuilt instance.
    ///
    /// # Panics
    /// Panics if the current mode is not [`VertexMode::Instanced`].
    pub fn cache_instance(&mut self, instance: InstanceRecord) {
        self.assert_mode(VertexMode::Instanced, "cache_instance");
        self.instances.push(instance);
        self.open_mut().primitives.end += 1;
    }

    /// Appends raw vertices in the current topology.
    ///
    /// # Panics
    /// Panics if the current mode is not [`VertexMode::Vertices`].
    pub fn cache_vertices(&mut self, vertices: &[VertexRecord]) {
        self.assert_mode(VertexMode::Vertices, "cache_vertices");
        self.vertices.extend_from_slice(vertices);
        self.open_mut().primitives.end += vertices.len() as u32;
    }

    // ── flush ─────────────────────────────────────────────────────────────

    /// Replays every batch on `backend`, then resets to a single empty batch
    /// that inherits the last batch's draw state.
    pub fn flush<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        surface: SurfaceSize,
    ) -> FlushStats {
        let stats = flush::execute(self, backend, surface);
        self.reset();
        stats
    }

    /// Drops finished batches and per-frame data, keeping capacity.
    ///
    /// Texture bindings return to the default binding and uniform overrides
    /// are cleared; the scalar state of the last batch carries over.
    pub fn reset(&mut self) {
        let state = self.open().state;

        self.batches.clear();
        self.instances.clear();
        self.vertices.clear();
        self.uniforms.clear();
        self.textures.clear();
        self.textures.push(TextureBinding::DEFAULT);

        self.batches.push(Batch::open(state, 0, 0..1, 0..0));
    }

    // ── internals ─────────────────────────────────────────────────────────

    #[inline]
    fn open(&self) -> &Batch {
        // `batches` is never empty: construction and `reset` push the open batch.
        &self.batches[self.batches.len() - 1]
    }

    #[inline]
    fn open_mut(&mut self) -> &mut Batch {
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }

    fn primitive_len(&self, mode: VertexMode) -> u32 {
        match mode {
            VertexMode::Instanced => self.instances.len() as u32,
            VertexMode::Vertices => self.vertices.len() as u32,
        }
    }

    fn state_mut(&mut self) -> &mut DrawState {
        self.prepare_mutation();
        &mut self.open_mut().state
    }

    fn prepare_mutation(&mut self) {
        if !self.open().is_empty() {
            self.split();
        }
    }

    /// Closes the open batch and opens a copy of it after the current data.
    fn split(&mut self) {
        let prev = self.open().clone();

        let tex_start = self.textures.len() as u32;
        self.textures
            .extend_from_within(prev.textures.start as usize..prev.textures.end as usize);
        let uni_start = self.uniforms.len() as u32;
        self.uniforms
            .extend_from_within(prev.uniforms.start as usize..prev.uniforms.end as usize);

        let start = self.primitive_len(prev.state.mode);
        self.batches.push(Batch::open(
            prev.state,
            start,
            tex_start..self.textures.len() as u32,
            uni_start..self.uniforms.len() as u32,
        ));

        log::trace!(
            "batch {} closed with {} primitives, opened batch {}",
            self.batches.len() - 2,
            prev.primitive_count(),
            self.batches.len() - 1
        );
    }

    fn bind_unit(&mut self, unit: u8, apply: impl FnOnce(&mut TextureBinding)) {
        assert!(
            unit < MAX_TEXTURE_UNITS,
            "texture unit {unit} out of range (max {MAX_TEXTURE_UNITS})"
        );
        self.prepare_mutation();

        let range = self.open().textures.clone();
        let slot = self.textures[range.start as usize..range.end as usize]
            .iter()
            .position(|b| b.unit == unit);

        match slot {
            Some(i) => apply(&mut self.textures[range.start as usize + i]),
            None => {
                let mut binding = TextureBinding {
                    unit,
                    texture: Texture::WHITE,
                    sampler: SamplerId::LINEAR,
                };
                apply(&mut binding);
                self.textures.push(binding);
                self.open_mut().textures.end += 1;
            }
        }
    }

    fn unit0_texture(&self) -> Texture {
        self.bound_texture(0).unwrap_or(Texture::WHITE)
    }

    fn assert_mode(&self, expected: VertexMode, op: &str) {
        let mode = self.state().mode;
        assert!(mode == expected, "{op} requires {expected:?} mode, current mode is {mode:?}");
    }
}
