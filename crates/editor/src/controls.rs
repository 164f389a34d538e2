//! Editable transform fields and the ranges the editor keeps them in.

use std::fmt;
use std::str::FromStr;

use matte_common::error::{MatteError, MatteResult};
use matte_model::transform::{Transform, TransformPatch};

/// Inclusive bounds and nudge step of a control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ControlRange {
    pub const SCALE: ControlRange = ControlRange {
        min: 0.1,
        max: 3.0,
        step: 0.05,
    };
    pub const ROTATION: ControlRange = ControlRange {
        min: 0.0,
        max: 360.0,
        step: 1.0,
    };
    pub const OPACITY: ControlRange = ControlRange {
        min: 0.0,
        max: 1.0,
        step: 0.01,
    };

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// One field of the transform as exposed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    X,
    Y,
    Scale,
    Rotation,
    Opacity,
}

impl Control {
    pub const ALL: [Control; 5] = [
        Control::X,
        Control::Y,
        Control::Scale,
        Control::Rotation,
        Control::Opacity,
    ];

    /// Position is unbounded.
    pub fn range(&self) -> Option<ControlRange> {
        match self {
            Self::X | Self::Y => None,
            Self::Scale => Some(ControlRange::SCALE),
            Self::Rotation => Some(ControlRange::ROTATION),
            Self::Opacity => Some(ControlRange::OPACITY),
        }
    }

    /// Build a patch setting this field to `value`, clamped to its range.
    pub fn patch(&self, value: f64) -> MatteResult<TransformPatch> {
        if !value.is_finite() {
            return Err(MatteError::invalid_input(format!(
                "{self} must be a finite number"
            )));
        }
        let value = self.range().map_or(value, |r| r.clamp(value));

        let mut patch = TransformPatch::default();
        match self {
            Self::X => patch.x = Some(value),
            Self::Y => patch.y = Some(value),
            Self::Scale => patch.scale = Some(value),
            Self::Rotation => patch.rotation = Some(value),
            Self::Opacity => patch.opacity = Some(value),
        }
        Ok(patch)
    }

    pub fn value(&self, transform: &Transform) -> f64 {
        match self {
            Self::X => transform.x,
            Self::Y => transform.y,
            Self::Scale => transform.scale,
            Self::Rotation => transform.rotation,
            Self::Opacity => transform.opacity,
        }
    }

    /// Value as shown in the control badges: whole pixels, percentages for
    /// scale and opacity, whole degrees for rotation.
    pub fn display_value(&self, transform: &Transform) -> String {
        match self {
            Self::X => transform.rounded_position().0.to_string(),
            Self::Y => transform.rounded_position().1.to_string(),
            Self::Scale => format!("{}%", (transform.scale * 100.0).round()),
            Self::Rotation => format!("{}°", transform.display_rotation().round()),
            Self::Opacity => format!("{}%", (transform.opacity * 100.0).round()),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Scale => "scale",
            Self::Rotation => "rotation",
            Self::Opacity => "opacity",
        })
    }
}

impl FromStr for Control {
    type Err = MatteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            "scale" | "s" => Ok(Self::Scale),
            "rotation" | "rotate" | "r" => Ok(Self::Rotation),
            "opacity" | "alpha" | "o" => Ok(Self::Opacity),
            other => Err(MatteError::invalid_input(format!(
                "Unknown control: {other}. Use: x, y, scale, rotation, opacity"
            ))),
        }
    }
}
