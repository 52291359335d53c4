//! Frame timing.
//!
//! One `FrameClock` per render loop; `tick()` once per flushed frame yields
//! the `FrameTime` carried by the frame context.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
