use super::{PixelRect, Vec2};

/// Smallest extent a zoom can produce on either axis.
///
/// Zooming far in divides by the extent; below this the anchor ratios lose
/// all precision, so extents are clamped here instead.
pub const MIN_SPACE_EXTENT: f32 = 1e-6;

/// Rectangular region of a user-defined 2D coordinate system.
///
/// Used both for world viewing regions (the projection of a batch) and for
/// framebuffer pixel regions. Immutable: every operation returns a new value.
///
/// The algebra does not reject degenerate extents, but callers should keep
/// `extent.x > 0 && extent.y > 0`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Space {
    pub origin: Vec2,
    pub extent: Vec2,
}

impl Space {
    #[inline]
    pub const fn new(origin: Vec2, extent: Vec2) -> Self {
        Self { origin, extent }
    }

    #[inline]
    pub const fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(Vec2::new(x, y), Vec2::new(w, h))
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.extent
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.extent * 0.5
    }

    /// Position of `p` relative to the rectangle, `(0,0)` at origin and `(1,1)` at max.
    #[inline]
    pub fn normalized_position(self, p: Vec2) -> Vec2 {
        (p - self.origin) / self.extent
    }

    /// Grows one axis so the aspect ratio matches `target_px`.
    ///
    /// The axis that is too narrow is widened and the added extent is split
    /// evenly on both sides, so the centre is unchanged. Matching ratios (or
    /// non-positive inputs) return `self` as is.
    pub fn expand_to_aspect(self, target_px: Vec2) -> Space {
        if !(target_px.x > 0.0 && target_px.y > 0.0 && self.extent.x > 0.0 && self.extent.y > 0.0)
        {
            return self;
        }

        // Compare extent.x / extent.y against target.x / target.y without dividing.
        let lhs = self.extent.x * target_px.y;
        let rhs = self.extent.y * target_px.x;

        let mut extent = self.extent;
        if lhs < rhs {
            extent.x = self.extent.y * target_px.x / target_px.y;
        } else if lhs > rhs {
            extent.y = self.extent.x * target_px.y / target_px.x;
        } else {
            return self;
        }

        let delta = extent - self.extent;
        Space::new(self.origin - delta * 0.5, extent)
    }

    /// Scales the extent by `1 / zoom` around the unchanged midpoint.
    pub fn zoom_to_center(self, zoom: f32) -> Space {
        let Some(extent) = zoomed_extent(self.extent, zoom) else { return self };
        let center = self.center();
        Space::new(center - extent * 0.5, extent)
    }

    /// Scales the extent by `1 / zoom` keeping `anchor` at the same normalized
    /// position inside the rectangle ("zoom toward cursor").
    pub fn zoom_to_point(self, zoom: f32, anchor: Vec2) -> Space {
        let Some(extent) = zoomed_extent(self.extent, zoom) else { return self };

        let ratio = (anchor - self.origin) / self.extent;
        let new_ratio = (anchor - self.origin) / extent;

        let origin = self.origin - (ratio - new_ratio) * extent;
        Space::new(origin, extent)
    }
}

impl From<PixelRect> for Space {
    #[inline]
    fn from(r: PixelRect) -> Self {
        Space::new(r.origin(), r.size())
    }
}

/// Maps a pixel position inside a viewport into `projected` coordinates.
///
/// Screen space is top-left origin, so the viewport's top-left pixel maps to
/// `projected.origin` and its bottom-right corner to `projected.max()`.
pub fn map_cursor_to_space(
    screen: Vec2,
    projected: Space,
    viewport_origin: Vec2,
    viewport_size: Vec2,
) -> Vec2 {
    projected.origin + (screen - viewport_origin) / viewport_size * projected.extent
}

fn zoomed_extent(extent: Vec2, zoom: f32) -> Option<Vec2> {
    if !(zoom.is_finite() && zoom > 0.0) {
        return None;
    }
    Some((extent / zoom).max(Vec2::splat(MIN_SPACE_EXTENT)))
}
