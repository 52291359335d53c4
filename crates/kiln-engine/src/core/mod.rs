//! Frame-level contracts between a host loop and the code that draws.
//!
//! A host builds a [`FrameCtx`] each frame and drives a [`Scene`] through
//! [`run_frame`]: input, update, render, flush.

mod ctx;
mod scene;

pub use ctx::FrameCtx;
pub use scene::{Scene, SceneControl, SceneProps, run_frame};
