//! Deferred 2D rendering.
//!
//! Callers record geometry and state changes on a [`BatchScheduler`]; nothing
//! reaches the GPU until [`BatchScheduler::flush`] replays the batches on a
//! [`GpuBackend`].
//!
//! Convention:
//! - world geometry is in the units of the batch projection (top-left origin, +Y down)
//! - viewport and scissor rects are top-left pixels until the flush converts
//!   them for the backend

mod backend;
mod batch;
mod ctx;
mod flush;
mod geometry;
mod record;
mod state;
mod wgpu_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::GpuBackend;
pub use batch::{Batch, BatchConfig, BatchScheduler};
pub use ctx::{RenderCtx, RenderTarget};
pub use flush::FlushStats;
pub use geometry::{
    Glyph, GlyphSource, GlyphTable, TextRun, circle_instance, measure_text, normalized_tex_rect,
    sprite_instance, sprite_transform, text_instances,
};
pub use record::{InstanceRecord, VertexRecord};
pub use state::{
    BlendFactor, BlendMode, DrawFlags, DrawState, FLAGS_UNIFORM, MAX_TEXTURE_UNITS,
    PROJECTION_UNIFORM, SamplerId, ShaderId, Texture, TextureBinding, TextureId, Topology,
    UniformOverride, UniformValue, VertexMode, projection_matrix,
};
pub use wgpu_backend::{ShaderDesc, UNIFORM_BLOCK_SIZE, UniformKind, UniformLayout, WgpuBackend};
