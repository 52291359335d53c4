//! Coordinate and geometry types shared by the batcher and its callers.
//!
//! Canonical CPU space:
//! - Origin top-left
//! - +X right, +Y down
//!
//! The batcher turns a [`Space`] into an orthographic projection at flush time.

mod color;
mod pixels;
mod rect;
mod space;
mod vec2;

pub use color::Color;
pub use pixels::{PixelRect, SurfaceSize};
pub use rect::Rect;
pub use space::{map_cursor_to_space, Space, MIN_SPACE_EXTENT};
pub use vec2::Vec2;
