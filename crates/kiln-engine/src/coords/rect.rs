use super::Vec2;

/// Axis-aligned rectangle (top-left origin, +Y down).
///
/// Used for sprite placement in world units and for source regions in
/// texel units.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Square of side `2 * radius` centred on `center`.
    #[inline]
    pub fn around(center: Vec2, radius: f32) -> Self {
        Self::from_origin_size(center - Vec2::splat(radius), Vec2::splat(2.0 * radius))
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    /// Divides the rectangle by `extent`, mapping texel units into 0..1 UV space.
    ///
    /// A zero-sized `extent` component leaves that axis untouched.
    #[inline]
    pub fn normalized_by(self, extent: Vec2) -> Rect {
        let sx = if extent.x != 0.0 { extent.x } else { 1.0 };
        let sy = if extent.y != 0.0 { extent.y } else { 1.0 };
        let scale = Vec2::new(sx, sy);
        Rect::from_origin_size(self.origin / scale, self.size / scale)
    }

    /// `[x, y, w, h]`, the layout of an instance's texture rect.
    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.origin.x, self.origin.y, self.size.x, self.size.y]
    }
}
