use std::collections::HashSet;
use std::time::Instant;

use crate::coords::{SurfaceSize, Vec2};
use crate::core::FrameCtx;
use crate::time::FrameClock;

use super::frame::InputFrame;
use super::types::{ButtonState, InputEvent, Key, Modifiers, MouseButton, WheelDelta};

/// Input state that persists across frames.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,
    /// Surface pixels, top-left origin; `None` while the pointer is outside.
    pub cursor: Option<Vec2>,
    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,
}

impl InputState {
    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }
}

/// Collects events between frames and builds each frame's [`FrameCtx`].
///
/// ```ignore
/// source.push(event);            // as the host delivers them
/// let ctx = source.begin_frame(); // once per frame
/// run_frame(&mut scene, &ctx, &mut batcher, &mut backend);
/// ```
#[derive(Debug)]
pub struct FrameSource {
    surface: SurfaceSize,
    state: InputState,
    pending: InputFrame,
    current: InputFrame,
    clock: FrameClock,
}

impl FrameSource {
    pub fn new(surface: SurfaceSize) -> Self {
        Self::with_clock(surface, FrameClock::new())
    }

    pub fn with_clock(surface: SurfaceSize, clock: FrameClock) -> Self {
        Self {
            surface,
            state: InputState { focused: true, ..InputState::default() },
            pending: InputFrame::default(),
            current: InputFrame::default(),
            clock,
        }
    }

    #[inline]
    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    #[inline]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Applies `event` to the persistent state and queues it for the next frame.
    pub fn push(&mut self, event: InputEvent) {
        let frame = &mut self.pending;

        match &event {
            InputEvent::Key { key, state, modifiers, .. } => {
                self.state.modifiers = *modifiers;
                match state {
                    ButtonState::Pressed => {
                        if self.state.keys_down.insert(*key) {
                            frame.keys_pressed.insert(*key);
                        }
                    }
                    ButtonState::Released => {
                        if self.state.keys_down.remove(key) {
                            frame.keys_released.insert(*key);
                        }
                    }
                }
            }

            InputEvent::PointerMoved { position } => {
                self.state.cursor = Some(*position);
            }

            InputEvent::PointerButton { button, state, position, modifiers } => {
                self.state.cursor = Some(*position);
                self.state.modifiers = *modifiers;
                match state {
                    ButtonState::Pressed => {
                        if self.state.buttons_down.insert(*button) {
                            frame.buttons_pressed.insert(*button);
                        }
                    }
                    ButtonState::Released => {
                        if self.state.buttons_down.remove(button) {
                            frame.buttons_released.insert(*button);
                        }
                    }
                }
            }

            InputEvent::Wheel { delta, modifiers } => {
                self.state.modifiers = *modifiers;
                if let WheelDelta::Lines(lines) = delta {
                    frame.wheel_lines += *lines;
                }
            }

            InputEvent::Text(text) => frame.text.push_str(text),

            InputEvent::PointerLeft => self.state.cursor = None,

            InputEvent::Focused(focused) => {
                self.state.focused = *focused;
                if !*focused {
                    // Releases never arrive for keys held while unfocused.
                    self.state.keys_down.clear();
                    self.state.buttons_down.clear();
                }
            }

            InputEvent::Resized(size) => {
                log::debug!("surface resized to {}x{}", size.width, size.height);
                self.surface = *size;
            }
        }

        frame.events.push(event);
    }

    /// Ends event collection for the current frame and returns its context.
    pub fn begin_frame(&mut self) -> FrameCtx<'_> {
        self.begin_frame_at(Instant::now())
    }

    pub fn begin_frame_at(&mut self, now: Instant) -> FrameCtx<'_> {
        std::mem::swap(&mut self.current, &mut self.pending);
        self.pending.clear();

        let time = self.clock.tick_at(now);
        FrameCtx::new(time, self.surface, &self.state, &self.current)
    }
}
