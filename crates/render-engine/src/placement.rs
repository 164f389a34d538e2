//! Foreground placement shared by the compositor and the mask generator.
//!
//! The foreground is drawn as a canvas 2D context would after
//! `translate(center + offset)`, `rotate(rotation)`, `scale(s, s)`, with the
//! image centered on the resulting origin. Rendering walks the canvas and
//! maps each pixel center back into foreground pixel space.

use matte_model::geometry::Size;
use matte_model::transform::Transform;

/// Inclusive-exclusive pixel span on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// Resolved placement of one foreground on one canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    origin_x: f64,
    origin_y: f64,
    cos: f64,
    sin: f64,
    scale: f64,
    rendered_w: f64,
    rendered_h: f64,
    source_w: f64,
    source_h: f64,
}

impl Placement {
    /// Resolve the placement of `foreground` on `canvas`.
    ///
    /// The rendered size keeps the foreground's size relationship with the
    /// background: `fg.w * canvas.w / background.w` (and likewise for
    /// height), so display and source renders agree. Returns `None` when
    /// nothing would be drawn (zero or non-finite scale, empty sizes,
    /// non-finite offsets or rotation).
    pub fn resolve(
        transform: &Transform,
        canvas: Size,
        background: Size,
        foreground: Size,
    ) -> Option<Self> {
        if canvas.is_empty() || background.is_empty() || foreground.is_empty() {
            return None;
        }
        if !(transform.scale.is_finite() && transform.scale != 0.0) {
            return None;
        }
        if !(transform.x.is_finite() && transform.y.is_finite() && transform.rotation.is_finite())
        {
            return None;
        }

        let rendered_w = foreground.width as f64 * canvas.width as f64 / background.width as f64;
        let rendered_h =
            foreground.height as f64 * canvas.height as f64 / background.height as f64;
        let (sin, cos) = transform.rotation_radians().sin_cos();

        Some(Self {
            origin_x: canvas.width as f64 / 2.0 + transform.x,
            origin_y: canvas.height as f64 / 2.0 + transform.y,
            cos,
            sin,
            scale: transform.scale,
            rendered_w,
            rendered_h,
            source_w: foreground.width as f64,
            source_h: foreground.height as f64,
        })
    }

    /// Map a canvas point to continuous foreground pixel coordinates.
    ///
    /// `(0, 0)` is the foreground's top-left corner and
    /// `(width, height)` its bottom-right.
    pub fn to_foreground(&self, cx: f64, cy: f64) -> (f64, f64) {
        let dx = cx - self.origin_x;
        let dy = cy - self.origin_y;

        // Undo rotate, then scale.
        let lx = (dx * self.cos + dy * self.sin) / self.scale;
        let ly = (-dx * self.sin + dy * self.cos) / self.scale;

        let u = (lx + self.rendered_w / 2.0) * self.source_w / self.rendered_w;
        let v = (ly + self.rendered_h / 2.0) * self.source_h / self.rendered_h;
        (u, v)
    }

    /// Map a point in rendered-foreground space (centered on the origin)
    /// to the canvas.
    pub fn to_canvas(&self, lx: f64, ly: f64) -> (f64, f64) {
        let sx = lx * self.scale;
        let sy = ly * self.scale;
        (
            self.origin_x + sx * self.cos - sy * self.sin,
            self.origin_y + sx * self.sin + sy * self.cos,
        )
    }

    /// Canvas pixels the foreground may touch, clipped to the canvas.
    pub fn canvas_bounds(&self, canvas: Size) -> PixelRect {
        let hw = self.rendered_w / 2.0;
        let hh = self.rendered_h / 2.0;
        let corners = [
            self.to_canvas(-hw, -hh),
            self.to_canvas(hw, -hh),
            self.to_canvas(hw, hh),
            self.to_canvas(-hw, hh),
        ];

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        // One pixel of slack for bilinear footprints.
        let clip = |v: f64, limit: u32| -> u32 { v.max(0.0).min(limit as f64) as u32 };
        PixelRect {
            x0: clip(min_x.floor() - 1.0, canvas.width),
            y0: clip(min_y.floor() - 1.0, canvas.height),
            x1: clip(max_x.ceil() + 1.0, canvas.width),
            y1: clip(max_y.ceil() + 1.0, canvas.height),
        }
    }

    /// Width and height of the foreground before `scale` is applied.
    pub fn rendered_size(&self) -> (f64, f64) {
        (self.rendered_w, self.rendered_h)
    }
}
