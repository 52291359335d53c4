use super::Vec2;

/// Output surface size in physical pixels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[inline]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// The rectangle covering the whole surface.
    #[inline]
    pub fn full_rect(self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }
}

/// Pixel rectangle used for viewports and scissors.
///
/// Callers work in top-left-origin pixels (+Y down). [`PixelRect::to_gpu`]
/// produces the bottom-left-origin form handed to a [`GpuBackend`].
///
/// [`GpuBackend`]: crate::render::GpuBackend
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn origin(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Clips the rectangle to the surface bounds.
    pub fn clamped_to(self, surface: SurfaceSize) -> PixelRect {
        let x = self.x.min(surface.width);
        let y = self.y.min(surface.height);
        let x2 = self.x.saturating_add(self.width).min(surface.width);
        let y2 = self.y.saturating_add(self.height).min(surface.height);
        PixelRect::new(x, y, x2 - x, y2 - y)
    }

    /// Flips between top-left and bottom-left origin conventions.
    ///
    /// The conversion is its own inverse for a fixed surface height. The rect
    /// is clamped to the surface first so the result never underflows.
    pub fn to_gpu(self, surface: SurfaceSize) -> PixelRect {
        let r = self.clamped_to(surface);
        PixelRect::new(r.x, surface.height - (r.y + r.height), r.width, r.height)
    }
}
