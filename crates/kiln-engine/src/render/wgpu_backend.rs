//! [`GpuBackend`] on top of wgpu.
//!
//! wgpu has no immediate-mode state, and `queue.write_buffer` calls issued
//! between draws all land before the command buffer runs. The backend
//! therefore records: every draw captures the state it was issued under and
//! a copy of the current shader's uniform block. [`WgpuBackend::submit`]
//! uploads everything once and encodes a single render pass.
//!
//! Resources:
//! - group 0: one `UNIFORM_BLOCK_SIZE` block per draw, bound with a dynamic offset
//! - group 1: texture units 0..4, one bind group per distinct unit set
//! - pipelines cached per (shader, blend, topology, mode) for the current
//!   surface format

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::ops::Range;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use crate::coords::PixelRect;

use super::backend::GpuBackend;
use super::ctx::{RenderCtx, RenderTarget};
use super::record::{InstanceRecord, QUAD_INDICES, QUAD_VERTICES, QuadVertex, VertexRecord};
use super::state::{
    BlendFactor, BlendMode, FLAGS_UNIFORM, MAX_TEXTURE_UNITS, PROJECTION_UNIFORM, SamplerId,
    ShaderId, Texture, TextureBinding, TextureId, Topology, UniformValue, VertexMode,
};

/// Size of one per-draw uniform block; also the dynamic offset stride.
pub const UNIFORM_BLOCK_SIZE: u32 = 256;

const BUILTIN_SHADER_SOURCE: &str = include_str!("shaders/batch.wgsl");

const UNITS: usize = MAX_TEXTURE_UNITS as usize;

type UnitSet = [(TextureId, SamplerId); UNITS];

const DEFAULT_UNITS: UnitSet = [(TextureId::WHITE, SamplerId::LINEAR); UNITS];

// ── uniform layout ────────────────────────────────────────────────────────

/// Type of a uniform block member.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    pub fn of(value: &UniformValue) -> Self {
        match value {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// `(size, align)` in a WGSL uniform-address-space struct.
    fn size_align(self) -> (u32, u32) {
        match self {
            UniformKind::Int | UniformKind::Float => (4, 4),
            UniformKind::Vec2 => (8, 8),
            UniformKind::Vec3 => (12, 16),
            UniformKind::Vec4 => (16, 16),
            UniformKind::Mat4 => (64, 16),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct UniformSlot {
    name: Cow<'static, str>,
    kind: UniformKind,
    offset: u32,
}

/// Byte layout of a shader's uniform block.
///
/// Always starts with the built-in projection (`mat4x4<f32>`) and flags
/// (`vec4<f32>`); declared fields follow in order, placed with WGSL
/// alignment rules. The WGSL struct must declare the same members in the
/// same order.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: u32,
}

impl UniformLayout {
    pub fn new<N>(fields: impl IntoIterator<Item = (N, UniformKind)>) -> Result<Self>
    where
        N: Into<Cow<'static, str>>,
    {
        let mut layout = UniformLayout { slots: Vec::new(), size: 0 };
        layout.push(PROJECTION_UNIFORM.into(), UniformKind::Mat4)?;
        layout.push(FLAGS_UNIFORM.into(), UniformKind::Vec4)?;
        for (name, kind) in fields {
            layout.push(name.into(), kind)?;
        }
        Ok(layout)
    }

    /// Bytes used, before padding to [`UNIFORM_BLOCK_SIZE`].
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Offset and kind of `name`.
    pub fn field(&self, name: &str) -> Option<(u32, UniformKind)> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| (s.offset, s.kind))
    }

    fn push(&mut self, name: Cow<'static, str>, kind: UniformKind) -> Result<()> {
        anyhow::ensure!(
            self.field(&name).is_none(),
            "uniform `{name}` declared twice"
        );
        let (size, align) = kind.size_align();
        let offset = self.size.next_multiple_of(align);
        anyhow::ensure!(
            offset + size <= UNIFORM_BLOCK_SIZE,
            "uniform `{name}` does not fit in a {UNIFORM_BLOCK_SIZE}-byte block"
        );
        self.slots.push(UniformSlot { name, kind, offset });
        self.size = offset + size;
        Ok(())
    }
}

fn write_uniform(block: &mut [u8], offset: u32, value: &UniformValue) {
    let bytes: &[u8] = match value {
        UniformValue::Int(v) => bytemuck::bytes_of(v),
        UniformValue::Float(v) => bytemuck::bytes_of(v),
        UniformValue::Vec2(v) => bytemuck::bytes_of(v),
        UniformValue::Vec3(v) => bytemuck::bytes_of(v),
        UniformValue::Vec4(v) => bytemuck::bytes_of(v),
        UniformValue::Mat4(v) => bytemuck::bytes_of(v),
    };
    let start = offset as usize;
    block[start..start + bytes.len()].copy_from_slice(bytes);
}

// ── shaders ───────────────────────────────────────────────────────────────

/// A WGSL program usable by the batcher.
///
/// The module must provide `vs_instanced` and `vs_vertex` with the vertex
/// inputs of the built-in shader, and declare the same group 0 / group 1
/// bindings. Only the fragment entry point and the trailing uniform fields
/// are free.
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub label: Cow<'static, str>,
    pub source: Cow<'static, str>,
    pub fragment_entry: Cow<'static, str>,
    pub uniforms: Vec<(Cow<'static, str>, UniformKind)>,
}

impl ShaderDesc {
    pub fn wgsl(label: impl Into<Cow<'static, str>>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            source: source.into(),
            fragment_entry: Cow::Borrowed("fs_main"),
            uniforms: Vec::new(),
        }
    }

    pub fn fragment(mut self, entry: impl Into<Cow<'static, str>>) -> Self {
        self.fragment_entry = entry.into();
        self
    }

    pub fn uniform(mut self, name: impl Into<Cow<'static, str>>, kind: UniformKind) -> Self {
        self.uniforms.push((name.into(), kind));
        self
    }
}

struct TextureEntry {
    view: wgpu::TextureView,
    // Keeps textures created by the backend alive.
    _texture: Option<wgpu::Texture>,
}

struct ShaderEntry {
    module: wgpu::ShaderModule,
    fragment_entry: String,
    layout: UniformLayout,
}

// ── recording ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PipelineKey {
    shader: ShaderId,
    blend: BlendMode,
    topology: Topology,
    mode: VertexMode,
}

#[derive(Debug, Clone)]
enum DrawKind {
    Instanced(Range<u32>),
    Vertices(Range<u32>),
    /// Range into the generated line-loop index buffer.
    LineLoop(Range<u32>),
}

#[derive(Debug, Clone)]
struct PendingDraw {
    key: PipelineKey,
    units: UnitSet,
    /// Bottom-left origin, as received.
    viewport: PixelRect,
    scissor: Option<PixelRect>,
    uniform_offset: u32,
    kind: DrawKind,
}

#[derive(Debug, Copy, Clone)]
struct Current {
    viewport: PixelRect,
    scissor: Option<PixelRect>,
    shader: ShaderId,
    blend: BlendMode,
    units: UnitSet,
    mode: VertexMode,
}

impl Default for Current {
    fn default() -> Self {
        Self {
            viewport: PixelRect::default(),
            scissor: None,
            shader: ShaderId::DEFAULT,
            blend: BlendMode::default(),
            units: DEFAULT_UNITS,
            mode: VertexMode::Instanced,
        }
    }
}

/// A GPU buffer that grows to the next power of two on demand.
struct GrowableBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

impl GrowableBuffer {
    fn new(label: &'static str, usage: wgpu::BufferUsages) -> Self {
        Self { label, usage: usage | wgpu::BufferUsages::COPY_DST, buffer: None, capacity: 0 }
    }

    /// Uploads `bytes`, reallocating first if needed. Returns `true` on reallocation.
    fn write(&mut self, ctx: &RenderCtx<'_>, bytes: &[u8], min_size: u64) -> bool {
        let required = (bytes.len() as u64).max(min_size);
        let grown = if required > self.capacity || self.buffer.is_none() {
            let new_cap = required.next_power_of_two().max(min_size).max(1024);
            self.buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: new_cap,
                usage: self.usage,
                mapped_at_creation: false,
            }));
            self.capacity = new_cap;
            true
        } else {
            false
        };

        if let Some(buffer) = self.buffer.as_ref()
            && !bytes.is_empty()
        {
            ctx.queue.write_buffer(buffer, 0, bytes);
        }
        grown
    }
}

// ── backend ───────────────────────────────────────────────────────────────

/// Recording wgpu backend. Feed it through
/// [`BatchScheduler::flush`](super::BatchScheduler::flush), then call
/// [`submit`](Self::submit) once per frame.
pub struct WgpuBackend {
    globals_layout: wgpu::BindGroupLayout,
    textures_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,

    shaders: Vec<ShaderEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    next_texture: u32,
    samplers: Vec<wgpu::Sampler>,

    pipeline_format: Option<wgpu::TextureFormat>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_groups: HashMap<UnitSet, wgpu::BindGroup>,
    globals_group: Option<wgpu::BindGroup>,

    quad_vbo: wgpu::Buffer,
    quad_ibo: wgpu::Buffer,
    instance_vbo: GrowableBuffer,
    vertex_vbo: GrowableBuffer,
    uniform_buffer: GrowableBuffer,
    loop_ibo: GrowableBuffer,

    // Recorded since the last submit.
    instances: Vec<InstanceRecord>,
    vertices: Vec<VertexRecord>,
    instance_base: u32,
    vertex_base: u32,
    blocks: Vec<u8>,
    loop_indices: Vec<u32>,
    draws: Vec<PendingDraw>,

    current: Current,
    /// Current uniform block per shader; persists across frames like program state.
    shader_blocks: HashMap<ShaderId, Vec<u8>>,
    warned: HashSet<String>,
}

impl WgpuBackend {
    /// Creates layouts, the default samplers, the 1×1 white texture and the
    /// built-in shaders ([`ShaderId::DEFAULT`], [`ShaderId::CIRCLE`]).
    pub fn new(ctx: &RenderCtx<'_>) -> Result<Self> {
        let device = ctx.device;

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln globals bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_BLOCK_SIZE as u64),
                },
                count: None,
            }],
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..UNITS as u32)
            .flat_map(|unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();

        let textures_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kiln textures bgl"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kiln batch pipeline layout"),
            bind_group_layouts: &[&globals_layout, &textures_layout],
            immediate_size: 0,
        });

        let quad_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut backend = Self {
            globals_layout,
            textures_layout,
            pipeline_layout,
            shaders: Vec::new(),
            textures: HashMap::new(),
            next_texture: 0,
            samplers: Vec::new(),
            pipeline_format: None,
            pipelines: HashMap::new(),
            texture_groups: HashMap::new(),
            globals_group: None,
            quad_vbo,
            quad_ibo,
            instance_vbo: GrowableBuffer::new("kiln instance vbo", wgpu::BufferUsages::VERTEX),
            vertex_vbo: GrowableBuffer::new("kiln vertex vbo", wgpu::BufferUsages::VERTEX),
            uniform_buffer: GrowableBuffer::new("kiln uniform blocks", wgpu::BufferUsages::UNIFORM),
            loop_ibo: GrowableBuffer::new("kiln line loop ibo", wgpu::BufferUsages::INDEX),
            instances: Vec::new(),
            vertices: Vec::new(),
            instance_base: 0,
            vertex_base: 0,
            blocks: Vec::new(),
            loop_indices: Vec::new(),
            draws: Vec::new(),
            current: Current::default(),
            shader_blocks: HashMap::new(),
            warned: HashSet::new(),
        };

        backend.register_sampler(ctx, wgpu::FilterMode::Linear);
        backend.register_sampler(ctx, wgpu::FilterMode::Nearest);

        let white = backend
            .register_texture_rgba8(ctx, 1, 1, &[255, 255, 255, 255])
            .context("failed to create default white texture")?;
        debug_assert_eq!(white, Texture::WHITE);

        let default = backend
            .register_shader(ctx, ShaderDesc::wgsl("kiln default shader", BUILTIN_SHADER_SOURCE))?;
        let circle = backend.register_shader(
            ctx,
            ShaderDesc::wgsl("kiln circle shader", BUILTIN_SHADER_SOURCE).fragment("fs_circle"),
        )?;
        debug_assert_eq!((default, circle), (ShaderId::DEFAULT, ShaderId::CIRCLE));

        Ok(backend)
    }

    // ── registration ──────────────────────────────────────────────────────

    /// Compiles `desc` and returns its handle.
    pub fn register_shader(&mut self, ctx: &RenderCtx<'_>, desc: ShaderDesc) -> Result<ShaderId> {
        anyhow::ensure!(
            !desc.fragment_entry.is_empty(),
            "shader `{}` has no fragment entry point",
            desc.label
        );
        let layout = UniformLayout::new(desc.uniforms)
            .with_context(|| format!("invalid uniform layout for shader `{}`", desc.label))?;

        let module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label.as_ref()),
            source: wgpu::ShaderSource::Wgsl(desc.source),
        });

        let id = ShaderId(self.shaders.len() as u32);
        self.shaders.push(ShaderEntry {
            module,
            fragment_entry: desc.fragment_entry.into_owned(),
            layout,
        });
        log::debug!("registered shader {id:?} `{}`", desc.label);
        Ok(id)
    }

    /// Uploads tightly packed RGBA8 (sRGB) pixels as a new texture.
    pub fn register_texture_rgba8(
        &mut self,
        ctx: &RenderCtx<'_>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Texture> {
        anyhow::ensure!(width > 0 && height > 0, "texture has zero size ({width}x{height})");
        let expected = width as usize * height as usize * 4;
        anyhow::ensure!(
            pixels.len() == expected,
            "texture data is {} bytes, expected {expected} for {width}x{height} RGBA8",
            pixels.len()
        );

        let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.insert_texture(TextureEntry { view, _texture: Some(texture) }, width, height))
    }

    /// Registers a view created elsewhere (render targets, atlases).
    pub fn register_texture_view(
        &mut self,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Texture {
        self.insert_texture(TextureEntry { view, _texture: None }, width, height)
    }

    fn insert_texture(&mut self, entry: TextureEntry, width: u32, height: u32) -> Texture {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id, entry);
        Texture::new(id, width, height)
    }

    /// Adds a clamp-to-edge sampler with the given filter.
    pub fn register_sampler(&mut self, ctx: &RenderCtx<'_>, filter: wgpu::FilterMode) -> SamplerId {
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("kiln sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let id = SamplerId(self.samplers.len() as u32);
        self.samplers.push(sampler);
        id
    }

    // ── submit ────────────────────────────────────────────────────────────

    /// Encodes everything recorded since the last submit into one render pass
    /// on `target`, then clears the recording.
    pub fn submit(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        if !self.draws.is_empty() {
            // Mutating methods must happen before borrowing pipelines/buffers immutably.
            self.ensure_pipelines(ctx);
            self.ensure_texture_groups(ctx);
            self.upload(ctx);
            self.encode(ctx, target);
        }

        self.instances.clear();
        self.vertices.clear();
        self.instance_base = 0;
        self.vertex_base = 0;
        self.blocks.clear();
        self.loop_indices.clear();
        self.draws.clear();
    }

    fn ensure_pipelines(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format != Some(ctx.surface_format) {
            self.pipelines.clear();
            self.pipeline_format = Some(ctx.surface_format);
        }

        for draw in &self.draws {
            if self.pipelines.contains_key(&draw.key) {
                continue;
            }
            let Some(shader) = self.shaders.get(draw.key.shader.0 as usize) else { continue };
            let pipeline = create_pipeline(ctx, &self.pipeline_layout, shader, draw.key);
            self.pipelines.insert(draw.key, pipeline);
        }
    }

    fn ensure_texture_groups(&mut self, ctx: &RenderCtx<'_>) {
        for draw in &self.draws {
            if self.texture_groups.contains_key(&draw.units) {
                continue;
            }

            let mut entries = Vec::with_capacity(UNITS * 2);
            for (unit, (texture, sampler)) in draw.units.iter().enumerate() {
                let entry = self
                    .textures
                    .get(texture)
                    .or_else(|| self.textures.get(&TextureId::WHITE));
                let Some(entry) = entry else {
                    continue;
                };
                let sampler = self.samplers.get(sampler.0 as usize).or(self.samplers.first());
                let Some(sampler) = sampler else {
                    continue;
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: unit as u32 * 2,
                    resource: wgpu::BindingResource::TextureView(&entry.view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: unit as u32 * 2 + 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
            if entries.len() != UNITS * 2 {
                continue;
            }

            let group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kiln texture units"),
                layout: &self.textures_layout,
                entries: &entries,
            });
            self.texture_groups.insert(draw.units, group);
        }
    }

    fn upload(&mut self, ctx: &RenderCtx<'_>) {
        self.instance_vbo.write(ctx, bytemuck::cast_slice(&self.instances), 0);
        self.vertex_vbo.write(ctx, bytemuck::cast_slice(&self.vertices), 0);
        self.loop_ibo.write(ctx, bytemuck::cast_slice(&self.loop_indices), 0);

        let regrown = self
            .uniform_buffer
            .write(ctx, &self.blocks, UNIFORM_BLOCK_SIZE as u64);
        if regrown || self.globals_group.is_none() {
            let Some(buffer) = self.uniform_buffer.buffer.as_ref() else { return };
            self.globals_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("kiln globals"),
                layout: &self.globals_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: NonZeroU64::new(UNIFORM_BLOCK_SIZE as u64),
                    }),
                }],
            }));
        }
    }

    fn encode(&self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        let Some(globals) = self.globals_group.as_ref() else { return };
        let surface = ctx.surface_size;

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("kiln batch pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &self.draws {
            let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
            let Some(units) = self.texture_groups.get(&draw.units) else { continue };

            // wgpu wants top-left origin.
            let vp = draw.viewport.to_gpu(surface);
            let sc = draw.scissor.map_or(surface.full_rect(), |s| s.to_gpu(surface));
            if vp.is_empty() || sc.is_empty() {
                continue;
            }

            rpass.set_viewport(
                vp.x as f32,
                vp.y as f32,
                vp.width as f32,
                vp.height as f32,
                0.0,
                1.0,
            );
            rpass.set_scissor_rect(sc.x, sc.y, sc.width, sc.height);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, globals, &[draw.uniform_offset]);
            rpass.set_bind_group(1, units, &[]);

            match &draw.kind {
                DrawKind::Instanced(range) => {
                    let Some(instance_vbo) = self.instance_vbo.buffer.as_ref() else { continue };
                    rpass.set_vertex_buffer(0, self.quad_vbo.slice(..));
                    rpass.set_vertex_buffer(1, instance_vbo.slice(..));
                    rpass.set_index_buffer(self.quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
                    rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, range.clone());
                }
                DrawKind::Vertices(range) => {
                    let Some(vertex_vbo) = self.vertex_vbo.buffer.as_ref() else { continue };
                    rpass.set_vertex_buffer(0, vertex_vbo.slice(..));
                    rpass.draw(range.clone(), 0..1);
                }
                DrawKind::LineLoop(range) => {
                    let Some(vertex_vbo) = self.vertex_vbo.buffer.as_ref() else { continue };
                    let Some(loop_ibo) = self.loop_ibo.buffer.as_ref() else { continue };
                    rpass.set_vertex_buffer(0, vertex_vbo.slice(..));
                    rpass.set_index_buffer(loop_ibo.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(range.clone(), 0, 0..1);
                }
            }
        }
    }

    // ── recording helpers ─────────────────────────────────────────────────

    fn warn_once(&mut self, message: String) {
        if self.warned.insert(message.clone()) {
            log::warn!("{message}");
        }
    }

    fn record(&mut self, topology: Topology, kind: DrawKind) {
        let shader = self.current.shader;
        let offset = self.blocks.len() as u32;
        match self.shader_blocks.get(&shader) {
            Some(block) => self.blocks.extend_from_slice(block),
            None => self.blocks.resize(self.blocks.len() + UNIFORM_BLOCK_SIZE as usize, 0),
        }

        let mode = self.current.mode;
        self.draws.push(PendingDraw {
            key: PipelineKey {
                shader,
                blend: self.current.blend,
                // Instanced quads are always triangle lists.
                topology: if mode == VertexMode::Instanced {
                    Topology::Triangles
                } else {
                    topology
                },
                mode,
            },
            units: self.current.units,
            viewport: self.current.viewport,
            scissor: self.current.scissor,
            uniform_offset: offset,
            kind,
        });
    }
}

impl GpuBackend for WgpuBackend {
    fn upload_instances(&mut self, instances: &[InstanceRecord]) {
        // Several flushes may share one submit; later ranges are rebased.
        self.instance_base = self.instances.len() as u32;
        self.instances.extend_from_slice(instances);
        self.current.units = DEFAULT_UNITS;
    }

    fn upload_vertices(&mut self, vertices: &[VertexRecord]) {
        self.vertex_base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.current.viewport = rect;
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.current.scissor = rect;
    }

    fn bind_shader(&mut self, shader: ShaderId) {
        if (shader.0 as usize) < self.shaders.len() {
            self.current.shader = shader;
        } else {
            self.warn_once(format!("unknown shader {shader:?}, using the default shader"));
            self.current.shader = ShaderId::DEFAULT;
        }
    }

    fn set_blend(&mut self, blend: BlendMode) {
        self.current.blend = blend;
    }

    fn bind_texture(&mut self, binding: TextureBinding) {
        let mut texture = binding.texture.id;
        if !self.textures.contains_key(&texture) {
            self.warn_once(format!("unknown texture {texture:?}, using white"));
            texture = TextureId::WHITE;
        }
        if let Some(unit) = self.current.units.get_mut(binding.unit as usize) {
            *unit = (texture, binding.sampler);
        }
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let shader = self.current.shader;
        let Some(entry) = self.shaders.get(shader.0 as usize) else { return };

        match entry.layout.field(name) {
            Some((offset, kind)) if kind == UniformKind::of(&value) => {
                let block = self
                    .shader_blocks
                    .entry(shader)
                    .or_insert_with(|| vec![0; UNIFORM_BLOCK_SIZE as usize]);
                write_uniform(block, offset, &value);
            }
            Some((_, kind)) => {
                self.warn_once(format!(
                    "uniform `{name}` of {shader:?} is {kind:?}, got {:?}",
                    UniformKind::of(&value)
                ));
            }
            None => {
                // Debug level: custom uniforms pushed for other shaders are common.
                if self.warned.insert(format!("{shader:?}/{name}")) {
                    log::debug!("{shader:?} has no uniform `{name}`; ignored");
                }
            }
        }
    }

    fn bind_vertex_layout(&mut self, mode: VertexMode) {
        self.current.mode = mode;
    }

    fn draw_instanced(&mut self, topology: Topology, instances: Range<u32>) {
        let base = self.instance_base;
        self.record(topology, DrawKind::Instanced(instances.start + base..instances.end + base));
    }

    fn draw_vertices(&mut self, topology: Topology, vertices: Range<u32>) {
        let base = self.vertex_base;
        let range = vertices.start + base..vertices.end + base;

        if topology == Topology::LineLoop {
            let start = self.loop_indices.len() as u32;
            self.loop_indices.extend(range.clone());
            self.loop_indices.push(range.start);
            let end = self.loop_indices.len() as u32;
            self.record(topology, DrawKind::LineLoop(start..end));
        } else {
            self.record(topology, DrawKind::Vertices(range));
        }
    }
}

// ── pipelines ─────────────────────────────────────────────────────────────

fn create_pipeline(
    ctx: &RenderCtx<'_>,
    layout: &wgpu::PipelineLayout,
    shader: &ShaderEntry,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let instanced = [QuadVertex::layout(), InstanceRecord::layout()];
    let raw = [VertexRecord::layout()];
    let (vertex_entry, buffers): (&str, &[wgpu::VertexBufferLayout<'_>]) = match key.mode {
        VertexMode::Instanced => ("vs_instanced", &instanced),
        VertexMode::Vertices => ("vs_vertex", &raw),
    };

    ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kiln batch pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: &shader.module,
            entry_point: Some(vertex_entry),
            compilation_options: Default::default(),
            buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader.module,
            entry_point: Some(shader.fragment_entry.as_str()),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: ctx.surface_format,
                blend: Some(blend_state(key.blend)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: primitive_topology(key.topology),
            strip_index_format: (key.topology == Topology::LineLoop)
                .then_some(wgpu::IndexFormat::Uint32),
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Topology::Lines => wgpu::PrimitiveTopology::LineList,
        // Loops are strips over an index buffer that repeats the first vertex.
        Topology::LineStrip | Topology::LineLoop => wgpu::PrimitiveTopology::LineStrip,
        Topology::Points => wgpu::PrimitiveTopology::PointList,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(mode.src),
        dst_factor: blend_factor(mode.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}
