//! Foreground placement transform.

use serde::{Deserialize, Serialize};

/// Placement of the foreground layer over the background.
///
/// `x`/`y` offset the foreground's center from the background's center, in
/// pixels of whichever canvas the transform is expressed in. `rotation` is
/// in degrees, clockwise, and is not wrapped. `opacity` only affects the
/// composite, never the mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl Transform {
    /// The untransformed placement: centered, unscaled, unrotated, opaque.
    pub const IDENTITY: Transform = Transform {
        x: 0.0,
        y: 0.0,
        scale: 1.0,
        rotation: 0.0,
        opacity: 1.0,
    };

    /// Rotation wrapped into `[0, 360)` for display.
    pub fn display_rotation(&self) -> f64 {
        self.rotation.rem_euclid(360.0)
    }

    /// Rotation in radians.
    pub fn rotation_radians(&self) -> f64 {
        self.rotation.to_radians()
    }

    /// Position rounded to whole pixels, as shown in status badges.
    pub fn rounded_position(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }

    /// Return a copy with `patch` merged in.
    pub fn merged(mut self, patch: &TransformPatch) -> Self {
        patch.apply_to(&mut self);
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A partial transform update. `None` fields leave the target unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl TransformPatch {
    /// Patch that moves the foreground to `(x, y)`.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Patch that sets every field.
    pub fn full(transform: Transform) -> Self {
        Self {
            x: Some(transform.x),
            y: Some(transform.y),
            scale: Some(transform.scale),
            rotation: Some(transform.rotation),
            opacity: Some(transform.opacity),
        }
    }

    /// Whether the patch carries no fields.
    pub fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.scale.is_none()
            && self.rotation.is_none()
            && self.opacity.is_none()
    }

    /// Merge this patch into `target`.
    pub fn apply_to(&self, target: &mut Transform) {
        if let Some(x) = self.x {
            target.x = x;
        }
        if let Some(y) = self.y {
            target.y = y;
        }
        if let Some(scale) = self.scale {
            target.scale = scale;
        }
        if let Some(rotation) = self.rotation {
            target.rotation = rotation;
        }
        if let Some(opacity) = self.opacity {
            target.opacity = opacity;
        }
    }
}
