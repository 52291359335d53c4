//! GPU-facing per-primitive records.
//!
//! Both records are `#[repr(C)]` + `Pod` so the per-frame arrays upload with a
//! single `bytemuck::cast_slice`.

use bytemuck::{Pod, Zeroable};

use crate::coords::{Color, Rect, Vec2};

/// One instanced unit quad (sprite, circle or glyph).
///
/// Layout (96 bytes):
///
///  offset  0  transform  [[f32; 4]; 4]  loc 1..=4 (column-major)
///  offset 64  color      [f32; 4]       loc 5
///  offset 80  tex_rect   [f32; 4]       loc 6 (normalized x, y, w, h)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub tex_rect: [f32; 4],
}

impl InstanceRecord {
    #[inline]
    pub fn new(transform: glam::Mat4, color: Color, tex_rect: Rect) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            color: color.to_array(),
            tex_rect: tex_rect.to_array(),
        }
    }

    #[inline]
    pub fn matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_cols_array_2d(&self.transform)
    }

    const ATTRS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        1 => Float32x4, // transform col 0
        2 => Float32x4, // transform col 1
        3 => Float32x4, // transform col 2
        4 => Float32x4, // transform col 3
        5 => Float32x4, // color
        6 => Float32x4  // tex_rect
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRecord>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

/// One raw vertex for caller-driven topologies (line loops, point clouds, ...).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct VertexRecord {
    pub pos: [f32; 2],
    pub tex_coord: [f32; 2],
    pub color: [f32; 4],
}

impl VertexRecord {
    #[inline]
    pub fn new(pos: Vec2, tex_coord: Vec2, color: Color) -> Self {
        Self {
            pos: pos.to_array(),
            tex_coord: tex_coord.to_array(),
            color: color.to_array(),
        }
    }

    /// Untextured vertex (samples the centre of the default white texture).
    #[inline]
    pub fn colored(pos: Vec2, color: Color) -> Self {
        Self::new(pos, Vec2::splat(0.5), color)
    }

    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // tex_coord
        2 => Float32x4  // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VertexRecord>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// ── unit quad ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub pos: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(crate) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [0.0, 1.0] },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
