//! Input events and per-frame collection.
//!
//! Hosts translate their window-system events into [`InputEvent`]s and push
//! them into a [`FrameSource`], which hands out one frame context per frame.

mod frame;
mod source;
mod types;

pub use frame::InputFrame;
pub use source::{FrameSource, InputState};
pub use types::{ButtonState, InputEvent, Key, Modifiers, MouseButton, WheelDelta};
