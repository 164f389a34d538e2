//! Canvas geometry and display-to-source coordinate mapping.
//!
//! The preview draws the background into a canvas bounded by
//! [`DisplayBounds`]. Offsets edited on that canvas are scaled back up to
//! the background's native pixels for export.

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Geometry errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    #[error("display bounds must be positive (got {max_width}x{max_height})")]
    InvalidBounds { max_width: f64, max_height: f64 },
}

/// Integer pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Maximum box the display canvas must fit in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBounds {
    pub max_width: f64,
    pub max_height: f64,
}

impl DisplayBounds {
    /// The 800x600 preview box.
    pub const DEFAULT: DisplayBounds = DisplayBounds {
        max_width: 800.0,
        max_height: 600.0,
    };

    pub fn new(max_width: f64, max_height: f64) -> Result<Self, GeometryError> {
        if !(max_width > 0.0 && max_height > 0.0) {
            return Err(GeometryError::InvalidBounds {
                max_width,
                max_height,
            });
        }
        Ok(Self {
            max_width,
            max_height,
        })
    }
}

impl Default for DisplayBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The down-scaled preview canvas derived from a background's native size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    /// Display width (may be fractional).
    pub width: f64,
    /// Display height (may be fractional).
    pub height: f64,
    /// Display size over native size. Shared by both axes.
    ratio: f64,
}

impl DisplayGeometry {
    /// Fit `native` into `bounds`, preserving aspect ratio.
    ///
    /// Width is constrained first; if the height still overflows, both
    /// dimensions shrink again by the height ratio. Images already inside
    /// the bounds are left at native size.
    pub fn fit(native: Size, bounds: DisplayBounds) -> Result<Self, GeometryError> {
        if native.is_empty() {
            return Err(GeometryError::EmptyDimensions {
                width: native.width,
                height: native.height,
            });
        }

        let mut width = native.width as f64;
        let mut height = native.height as f64;
        let mut ratio = 1.0;

        if width > bounds.max_width {
            let r = bounds.max_width / width;
            ratio *= r;
            width = bounds.max_width;
            height *= r;
        }

        if height > bounds.max_height {
            let r = bounds.max_height / height;
            ratio *= r;
            height = bounds.max_height;
            width *= r;
        }

        Ok(Self {
            width,
            height,
            ratio,
        })
    }

    /// Whole-pixel canvas size (fractional parts truncated, never zero).
    pub fn canvas_size(&self) -> Size {
        Size {
            width: (self.width.floor() as u32).max(1),
            height: (self.height.floor() as u32).max(1),
        }
    }

    /// Display size over native size.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Factor that maps display-space pixels to source-space pixels.
    pub fn scale_factor(&self) -> ScaleFactor {
        let factor = 1.0 / self.ratio;
        ScaleFactor {
            sx: factor,
            sy: factor,
        }
    }
}

/// Display-to-source multiplier per axis.
///
/// Both axes come from the same ratio, so `sx == sy` holds exactly; a skewed
/// pair would distort mapped offsets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub sx: f64,
    pub sy: f64,
}

/// Display geometry for `native` inside the default 800x600 box.
pub fn display_geometry(native: Size) -> Result<DisplayGeometry, GeometryError> {
    DisplayGeometry::fit(native, DisplayBounds::DEFAULT)
}

/// Map a display-space transform into the background's native pixels using
/// the default display bounds.
pub fn to_source_space(transform: &Transform, native: Size) -> Result<Transform, GeometryError> {
    to_source_space_within(transform, native, DisplayBounds::DEFAULT)
}

/// Map a display-space transform into the background's native pixels.
///
/// Only the offset is rescaled. Scale and rotation act on the foreground's
/// own pixels and opacity is unitless, so they pass through unchanged.
pub fn to_source_space_within(
    transform: &Transform,
    native: Size,
    bounds: DisplayBounds,
) -> Result<Transform, GeometryError> {
    let factor = DisplayGeometry::fit(native, bounds)?.scale_factor();
    Ok(Transform {
        x: transform.x * factor.sx,
        y: transform.y * factor.sy,
        ..*transform
    })
}
