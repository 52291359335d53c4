//! Kiln engine crate.
//!
//! A deferred 2D renderer: callers interleave draw-state changes with
//! sprites, circles, glyph runs and raw vertices on a [`render::BatchScheduler`],
//! which groups them into the fewest draw calls that preserve submission
//! order and replays them on a [`render::GpuBackend`] when flushed.

pub mod coords;
pub mod core;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
