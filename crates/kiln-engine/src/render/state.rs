//! Draw state: everything that changes how a single GPU draw behaves.

use std::borrow::Cow;

use crate::coords::{PixelRect, Space};

/// Name of the built-in projection uniform (`mat4`), set before user overrides.
pub const PROJECTION_UNIFORM: &str = "u_projection";

/// Name of the built-in flags uniform (`vec4`: premultiply, antialias, flip u, flip v).
pub const FLAGS_UNIFORM: &str = "u_flags";

/// Number of texture units a batch can bind.
pub const MAX_TEXTURE_UNITS: u8 = 4;

/// Handle to a compiled shader program owned by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// Textured, tinted quads and vertices.
    pub const DEFAULT: ShaderId = ShaderId(0);
    /// Discards fragments outside the inscribed circle of each quad.
    pub const CIRCLE: ShaderId = ShaderId(1);
}

impl Default for ShaderId {
    fn default() -> Self {
        ShaderId::DEFAULT
    }
}

/// Handle to a texture owned by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const WHITE: TextureId = TextureId(0);
}

/// A bound image together with its pixel size.
///
/// The size is what source texel rectangles are normalized against.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Opaque white 1×1 texture bound to unit 0 by default.
    pub const WHITE: Texture = Texture { id: TextureId::WHITE, width: 1, height: 1 };

    #[inline]
    pub const fn new(id: TextureId, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}

/// Handle to a sampler owned by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SamplerId(pub u32);

impl SamplerId {
    pub const LINEAR: SamplerId = SamplerId(0);
    pub const NEAREST: SamplerId = SamplerId(1);
}

/// Texture + sampler bound to one unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureBinding {
    pub unit: u8,
    pub texture: Texture,
    pub sampler: SamplerId,
}

impl TextureBinding {
    pub const DEFAULT: TextureBinding = TextureBinding {
        unit: 0,
        texture: Texture::WHITE,
        sampler: SamplerId::LINEAR,
    };
}

/// Which storage a batch draws from.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum VertexMode {
    /// One [`InstanceRecord`](super::InstanceRecord) per unit quad.
    #[default]
    Instanced,
    /// Raw [`VertexRecord`](super::VertexRecord)s in the batch topology.
    Vertices,
}

/// Primitive topology.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum Topology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    /// Line strip closed back to its first vertex.
    LineLoop,
    Points,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Source/destination blend factor pair (additive equation).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendMode {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendMode {
    /// Source-over for premultiplied colors. The default.
    pub const PREMULTIPLIED: BlendMode =
        BlendMode::new(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);
    /// Source-over for straight-alpha colors.
    pub const ALPHA: BlendMode =
        BlendMode::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    pub const ADDITIVE: BlendMode = BlendMode::new(BlendFactor::One, BlendFactor::One);
    pub const MULTIPLY: BlendMode = BlendMode::new(BlendFactor::DstColor, BlendFactor::Zero);

    #[inline]
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst }
    }
}

impl Default for BlendMode {
    fn default() -> Self {
        Self::PREMULTIPLIED
    }
}

/// Boolean fragment/vertex switches, uploaded as [`FLAGS_UNIFORM`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct DrawFlags {
    pub premultiply_alpha: bool,
    pub antialias: bool,
    pub flip_tex_x: bool,
    pub flip_tex_y: bool,
}

impl DrawFlags {
    #[inline]
    pub fn to_uniform(self) -> [f32; 4] {
        let f = |b: bool| if b { 1.0 } else { 0.0 };
        [
            f(self.premultiply_alpha),
            f(self.antialias),
            f(self.flip_tex_x),
            f(self.flip_tex_y),
        ]
    }
}

/// Value of a named uniform override.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<glam::Mat4> for UniformValue {
    fn from(m: glam::Mat4) -> Self {
        UniformValue::Mat4(m.to_cols_array_2d())
    }
}

/// One `name = value` entry in a batch's uniform range.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformOverride {
    pub name: Cow<'static, str>,
    pub value: UniformValue,
}

/// Scalar part of the draw state.
///
/// Texture bindings and uniform overrides are part of the state too, but they
/// live in the scheduler's pools and are referenced by a batch's ranges.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DrawState {
    pub mode: VertexMode,
    pub topology: Topology,
    pub shader: ShaderId,
    pub blend: BlendMode,
    /// `None` covers the whole surface.
    pub viewport: Option<PixelRect>,
    pub scissor: Option<PixelRect>,
    /// `None` until first set.
    pub projection: Option<Space>,
    pub flags: DrawFlags,
}

impl DrawState {
    /// Returns the projection rectangle.
    ///
    /// # Panics
    /// Panics if no projection has been set yet.
    pub fn projection(&self) -> Space {
        match self.projection {
            Some(space) => space,
            None => panic!("draw state projection queried before it was set"),
        }
    }
}

/// Orthographic projection mapping `space` (top-left origin, +Y down) onto clip space.
pub fn projection_matrix(space: Space) -> glam::Mat4 {
    let max = space.max();
    glam::Mat4::orthographic_rh(space.origin.x, max.x, max.y, space.origin.y, -1.0, 1.0)
}
