use std::borrow::Cow;

use crate::coords::PixelRect;
use crate::render::{BatchScheduler, FlushStats, GpuBackend};

use super::ctx::FrameCtx;

/// What a scene asks of the host loop after handling input.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SceneControl {
    Continue,
    Exit,
}

/// Static description of a scene, read once per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneProps {
    pub name: Cow<'static, str>,
    /// Viewport applied before `render`; `None` for the whole surface.
    pub viewport: Option<PixelRect>,
    /// Skips `render` when `false`; `update` still runs.
    pub visible: bool,
    /// Skips `process_input` when `false`.
    pub accepts_input: bool,
}

impl Default for SceneProps {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("scene"),
            viewport: None,
            visible: true,
            accepts_input: true,
        }
    }
}

/// Something that draws itself each frame.
pub trait Scene {
    fn props(&self) -> SceneProps {
        SceneProps::default()
    }

    fn process_input(&mut self, ctx: &FrameCtx<'_>) -> SceneControl {
        let _ = ctx;
        SceneControl::Continue
    }

    fn update(&mut self, ctx: &FrameCtx<'_>);

    /// Records this frame's geometry. The batcher is flushed right after.
    fn render(&mut self, ctx: &FrameCtx<'_>, batch: &mut BatchScheduler);
}

/// Runs one frame of `scene`: input, update, render, then one flush.
pub fn run_frame<S, B>(
    scene: &mut S,
    ctx: &FrameCtx<'_>,
    batch: &mut BatchScheduler,
    backend: &mut B,
) -> (SceneControl, FlushStats)
where
    S: Scene + ?Sized,
    B: GpuBackend + ?Sized,
{
    let props = scene.props();

    let control = if props.accepts_input {
        scene.process_input(ctx)
    } else {
        SceneControl::Continue
    };

    scene.update(ctx);

    if props.visible {
        batch.set_viewport(props.viewport);
        scene.render(ctx, batch);
    }

    let stats = batch.flush(backend, ctx.surface);
    log::trace!("{}: frame {} {:?}", props.name, ctx.time.frame_index, stats);
    (control, stats)
}
