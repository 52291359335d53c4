use crate::coords::{PixelRect, Space, SurfaceSize, Vec2, map_cursor_to_space};
use crate::input::{InputEvent, InputFrame, InputState, Key, MouseButton};
use crate::time::FrameTime;

/// Everything a scene may read during one frame.
///
/// Built fresh by [`FrameSource::begin_frame`](crate::input::FrameSource::begin_frame);
/// nothing in it outlives the frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameCtx<'a> {
    pub time: FrameTime,
    /// Physical size of the surface being drawn.
    pub surface: SurfaceSize,
    /// Held keys/buttons, cursor, focus.
    pub state: &'a InputState,
    /// Events and transitions since the previous frame.
    pub input: &'a InputFrame,
}

impl<'a> FrameCtx<'a> {
    #[inline]
    pub fn new(
        time: FrameTime,
        surface: SurfaceSize,
        state: &'a InputState,
        input: &'a InputFrame,
    ) -> Self {
        Self { time, surface, state, input }
    }

    #[inline]
    pub fn dt(&self) -> f32 {
        self.time.dt
    }

    #[inline]
    pub fn events(&self) -> &'a [InputEvent] {
        &self.input.events
    }

    #[inline]
    pub fn cursor(&self) -> Option<Vec2> {
        self.state.cursor
    }

    /// Cursor mapped into `space` as seen through `viewport` (`None` = the
    /// whole surface). Useful for picking and for zoom anchors.
    pub fn cursor_in(&self, space: Space, viewport: Option<PixelRect>) -> Option<Vec2> {
        let cursor = self.state.cursor?;
        let vp = viewport.unwrap_or(self.surface.full_rect());
        if vp.is_empty() {
            return None;
        }
        Some(map_cursor_to_space(cursor, space, vp.origin(), vp.size()))
    }

    pub fn key_pressed(&self, key: Key) -> bool {
        self.input.keys_pressed.contains(&key)
    }

    pub fn button_pressed(&self, button: MouseButton) -> bool {
        self.input.buttons_pressed.contains(&button)
    }
}
