use std::ops::Range;

use crate::coords::PixelRect;

use super::record::{InstanceRecord, VertexRecord};
use super::state::{BlendMode, ShaderId, TextureBinding, Topology, UniformValue, VertexMode};

/// Low-level command sink driven by the flush.
///
/// Calls arrive in draw order: both uploads first, then for each non-empty
/// batch its full state followed by exactly one draw. Rectangles use the
/// bottom-left-origin GPU convention.
///
/// State set through this trait persists until overwritten, like a GL
/// context; the flush re-applies every field for every batch.
pub trait GpuBackend {
    fn upload_instances(&mut self, instances: &[InstanceRecord]);
    fn upload_vertices(&mut self, vertices: &[VertexRecord]);

    fn set_viewport(&mut self, rect: PixelRect);
    /// `None` disables scissoring.
    fn set_scissor(&mut self, rect: Option<PixelRect>);

    fn bind_shader(&mut self, shader: ShaderId);
    fn set_blend(&mut self, blend: BlendMode);
    fn bind_texture(&mut self, binding: TextureBinding);
    /// Sets a uniform on the currently bound shader.
    fn set_uniform(&mut self, name: &str, value: UniformValue);
    fn bind_vertex_layout(&mut self, mode: VertexMode);

    /// Draws unit quads for instances `instances` of the uploaded array.
    fn draw_instanced(&mut self, topology: Topology, instances: Range<u32>);
    /// Draws vertices `vertices` of the uploaded array.
    fn draw_vertices(&mut self, topology: Topology, vertices: Range<u32>);
}
