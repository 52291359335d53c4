//! Replays scheduled batches on a [`GpuBackend`].

use std::sync::Once;

use crate::coords::{PixelRect, Space, SurfaceSize, map_cursor_to_space};

use super::backend::GpuBackend;
use super::batch::{Batch, BatchScheduler};
use super::state::{
    FLAGS_UNIFORM, PROJECTION_UNIFORM, UniformValue, VertexMode, projection_matrix,
};

static PROJECTION_FALLBACK: Once = Once::new();

/// What one flush sent to the backend.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Batches inspected, empty ones included.
    pub batches: usize,
    pub draw_calls: usize,
    pub instances: usize,
    pub vertices: usize,
}

/// Uploads both arrays once, then applies state and draws per batch.
///
/// Empty batches are skipped entirely, as are batches whose viewport or
/// scissor does not intersect the surface.
pub(crate) fn execute<B: GpuBackend + ?Sized>(
    scheduler: &BatchScheduler,
    backend: &mut B,
    surface: SurfaceSize,
) -> FlushStats {
    let mut stats = FlushStats {
        batches: scheduler.batches().len(),
        instances: scheduler.instances().len(),
        vertices: scheduler.vertices().len(),
        ..FlushStats::default()
    };

    backend.upload_instances(scheduler.instances());
    backend.upload_vertices(scheduler.vertices());

    for batch in scheduler.batches() {
        if batch.is_empty() {
            continue;
        }
        if draw_batch(scheduler, batch, backend, surface) {
            stats.draw_calls += 1;
        }
    }

    log::debug!(
        "flush: {} batches, {} draws, {} instances, {} vertices",
        stats.batches,
        stats.draw_calls,
        stats.instances,
        stats.vertices
    );
    stats
}

fn draw_batch<B: GpuBackend + ?Sized>(
    scheduler: &BatchScheduler,
    batch: &Batch,
    backend: &mut B,
    surface: SurfaceSize,
) -> bool {
    let state = &batch.state;

    let requested = state.viewport.unwrap_or(surface.full_rect());
    let viewport = requested.clamped_to(surface);
    let scissor = state.scissor.map(|r| r.clamped_to(surface));
    if viewport.is_empty() || scissor.is_some_and(|r| r.is_empty()) {
        log::trace!("batch culled: viewport {viewport:?}, scissor {scissor:?}");
        return false;
    }

    backend.set_viewport(viewport.to_gpu(surface));
    backend.set_scissor(scissor.map(|r| r.to_gpu(surface)));
    backend.bind_shader(state.shader);
    backend.set_blend(state.blend);

    for binding in scheduler.batch_textures(batch) {
        backend.bind_texture(*binding);
    }

    let projection = match state.projection {
        Some(space) => crop_projection(space, requested, viewport),
        // Without an explicit projection, world units are viewport pixels.
        None => {
            PROJECTION_FALLBACK.call_once(|| {
                log::debug!("batch drawn without a projection; using viewport pixels");
            });
            Space::from(viewport)
        }
    };
    backend.set_uniform(PROJECTION_UNIFORM, projection_matrix(projection).into());
    backend.set_uniform(FLAGS_UNIFORM, UniformValue::Vec4(state.flags.to_uniform()));
    for uniform in scheduler.batch_uniforms(batch) {
        backend.set_uniform(&uniform.name, uniform.value);
    }

    backend.bind_vertex_layout(state.mode);
    match state.mode {
        VertexMode::Instanced => backend.draw_instanced(state.topology, batch.primitives.clone()),
        VertexMode::Vertices => backend.draw_vertices(state.topology, batch.primitives.clone()),
    }
    true
}

/// Narrows `projection` to the part of `requested` left after clamping to
/// the surface, so geometry keeps its scale and is clipped rather than squeezed.
fn crop_projection(projection: Space, requested: PixelRect, visible: PixelRect) -> Space {
    if visible == requested {
        return projection;
    }
    let (origin, size) = (requested.origin(), requested.size());
    let min = map_cursor_to_space(visible.origin(), projection, origin, size);
    let max = map_cursor_to_space(visible.origin() + visible.size(), projection, origin, size);
    Space::new(min, max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Color, PixelRect, Rect, Vec2};
    use crate::render::record::VertexRecord;
    use crate::render::state::{BlendMode, ShaderId, Texture, TextureBinding, TextureId, Topology};
    use crate::render::testing::{GpuCall, RecordingBackend, SoftRaster};

    const SURFACE: SurfaceSize = SurfaceSize::new(100, 50);

    fn sprite(b: &mut BatchScheduler) {
        b.cache_sprite(Rect::new(0.0, 0.0, 1.0, 1.0), 0.0, Vec2::ZERO, Color::WHITE, None);
    }

    fn flush(b: &mut BatchScheduler) -> (FlushStats, Vec<GpuCall>) {
        let mut backend = RecordingBackend::default();
        let stats = b.flush(&mut backend, SURFACE);
        (stats, backend.calls)
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn one_batch_call_sequence() {
        let mut b = BatchScheduler::new();
        b.push_uniform("u_time", 2.0);
        sprite(&mut b);
        sprite(&mut b);

        let (stats, calls) = flush(&mut b);
        assert_eq!(stats, FlushStats { batches: 1, draw_calls: 1, instances: 2, vertices: 0 });

        let full = PixelRect::new(0, 0, 100, 50);
        let proj = projection_matrix(Space::from(full));
        assert_eq!(calls, vec![
            GpuCall::UploadInstances(2),
            GpuCall::UploadVertices(0),
            GpuCall::SetViewport(full),
            GpuCall::SetScissor(None),
            GpuCall::BindShader(ShaderId::DEFAULT),
            GpuCall::SetBlend(BlendMode::PREMULTIPLIED),
            GpuCall::BindTexture(TextureBinding::DEFAULT),
            GpuCall::SetUniform(PROJECTION_UNIFORM.into(), proj.into()),
            GpuCall::SetUniform(FLAGS_UNIFORM.into(), UniformValue::Vec4([0.0; 4])),
            GpuCall::SetUniform("u_time".into(), UniformValue::Float(2.0)),
            GpuCall::BindVertexLayout(VertexMode::Instanced),
            GpuCall::DrawInstanced(Topology::Triangles, 0..2),
        ]);
    }

    #[test]
    fn uploads_happen_once_before_draws() {
        let mut b = BatchScheduler::new();
        sprite(&mut b);
        b.set_mode(VertexMode::Vertices);
        b.cache_vertices(&[VertexRecord::colored(Vec2::ZERO, Color::WHITE); 4]);
        b.set_mode(VertexMode::Instanced);
        sprite(&mut b);

        let (stats, calls) = flush(&mut b);
        assert_eq!(stats.draw_calls, 3);

        let uploads: Vec<_> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, GpuCall::UploadInstances(_) | GpuCall::UploadVertices(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(uploads, vec![0, 1]);

        let draws: Vec<_> = calls
            .into_iter()
            .filter(|c| matches!(c, GpuCall::DrawInstanced(..) | GpuCall::DrawVertices(..)))
            .collect();
        assert_eq!(draws, vec![
            GpuCall::DrawInstanced(Topology::Triangles, 0..1),
            GpuCall::DrawVertices(Topology::Triangles, 0..4),
            GpuCall::DrawInstanced(Topology::Triangles, 1..2),
        ]);
    }

    #[test]
    fn overrides_replay_in_push_order() {
        let mut b = BatchScheduler::new();
        b.push_uniform("u_tint", [1.0, 0.0, 0.0, 1.0]);
        b.push_uniform("u_tint", [0.0, 0.0, 1.0, 1.0]);
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        let tints: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::SetUniform(name, UniformValue::Vec4(v)) if name == "u_tint" => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(tints, vec![[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn texture_bindings_are_applied_per_batch() {
        let atlas = Texture::new(TextureId(2), 16, 16);
        let mut b = BatchScheduler::new();
        sprite(&mut b);
        b.set_texture(0, atlas);
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        let bound: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::BindTexture(t) => Some(t.texture.id),
                _ => None,
            })
            .collect();
        assert_eq!(bound, vec![TextureId::WHITE, TextureId(2)]);
    }

    // ── skipping ──────────────────────────────────────────────────────────

    #[test]
    fn empty_batches_issue_no_draw() {
        let mut b = BatchScheduler::new();
        b.break_batch();
        b.break_batch();
        sprite(&mut b);

        let (stats, calls) = flush(&mut b);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.draw_calls, 1);
        let shaders = calls.iter().filter(|c| matches!(c, GpuCall::BindShader(_))).count();
        assert_eq!(shaders, 1);
    }

    #[test]
    fn empty_frame_still_uploads_nothing_else() {
        let mut b = BatchScheduler::new();
        let (stats, calls) = flush(&mut b);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(calls, vec![GpuCall::UploadInstances(0), GpuCall::UploadVertices(0)]);
    }

    #[test]
    fn offscreen_scissor_culls_batch() {
        let mut b = BatchScheduler::new();
        b.set_scissor(PixelRect::new(200, 0, 10, 10));
        sprite(&mut b);
        let (stats, _) = flush(&mut b);
        assert_eq!(stats.draw_calls, 0);
    }

    // ── conversions ───────────────────────────────────────────────────────

    #[test]
    fn viewport_and_scissor_are_flipped_to_bottom_left() {
        let mut b = BatchScheduler::new();
        b.set_viewport(Some(PixelRect::new(10, 5, 40, 20)));
        b.set_scissor(PixelRect::new(0, 0, 30, 10));
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        assert!(calls.contains(&GpuCall::SetViewport(PixelRect::new(10, 25, 40, 20))));
        assert!(calls.contains(&GpuCall::SetScissor(Some(PixelRect::new(0, 40, 30, 10)))));
    }

    #[test]
    fn explicit_projection_is_uploaded() {
        let space = Space::from_xywh(-1.0, -1.0, 2.0, 2.0);
        let mut b = BatchScheduler::new();
        b.set_projection(space);
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        let expected =
            GpuCall::SetUniform(PROJECTION_UNIFORM.into(), projection_matrix(space).into());
        assert!(calls.contains(&expected));
    }

    #[test]
    fn flags_uniform_reflects_state() {
        let mut b = BatchScheduler::new();
        b.set_premultiply_alpha(true);
        b.set_flip_tex(false, true);
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        let expected =
            GpuCall::SetUniform(FLAGS_UNIFORM.into(), UniformValue::Vec4([1.0, 0.0, 0.0, 1.0]));
        assert!(calls.contains(&expected));
    }

    // ── viewports past the surface edge ───────────────────────────────────

    #[test]
    fn overhanging_viewport_crops_projection() {
        let mut b = BatchScheduler::new();
        b.set_viewport(Some(PixelRect::new(50, 0, 100, 50)));
        b.set_projection(Space::from_xywh(0.0, 0.0, 100.0, 50.0));
        sprite(&mut b);

        let (_, calls) = flush(&mut b);
        assert!(calls.contains(&GpuCall::SetViewport(PixelRect::new(50, 0, 50, 50))));
        let cropped = projection_matrix(Space::from_xywh(0.0, 0.0, 50.0, 50.0));
        assert!(calls.contains(&GpuCall::SetUniform(PROJECTION_UNIFORM.into(), cropped.into())));
    }

    #[test]
    fn overhanging_viewport_keeps_world_scale() {
        let mut b = BatchScheduler::new();
        b.set_viewport(Some(PixelRect::new(50, 0, 100, 50)));
        b.set_projection(Space::from_xywh(0.0, 0.0, 100.0, 50.0));
        b.cache_sprite(Rect::new(0.0, 0.0, 50.0, 50.0), 0.0, Vec2::ZERO, Color::WHITE, None);

        let mut raster = SoftRaster::new(SURFACE);
        b.flush(&mut raster, SURFACE);

        // World x maps to pixel 50 + x; the sprite ends at world 50.
        assert_eq!(raster.pixel(49, 25), [0.0; 4]);
        assert_eq!(raster.pixel(60, 25), [1.0; 4]);
        assert_eq!(raster.pixel(80, 25), [1.0; 4]);
        assert_eq!(raster.pixel(99, 25), [1.0; 4]);
    }

    #[test]
    fn missing_projection_uses_visible_viewport_pixels() {
        let mut b = BatchScheduler::new();
        b.set_viewport(Some(PixelRect::new(50, 10, 100, 100)));
        sprite(&mut b);

        let (stats, calls) = flush(&mut b);
        assert_eq!(stats.draw_calls, 1);
        let visible = projection_matrix(Space::from_xywh(50.0, 10.0, 50.0, 40.0));
        assert!(calls.contains(&GpuCall::SetUniform(PROJECTION_UNIFORM.into(), visible.into())));
    }

    #[test]
    fn viewport_fully_off_surface_is_culled() {
        let mut b = BatchScheduler::new();
        b.set_viewport(Some(PixelRect::new(100, 0, 20, 20)));
        sprite(&mut b);
        let (stats, _) = flush(&mut b);
        assert_eq!(stats.draw_calls, 0);
    }
}
