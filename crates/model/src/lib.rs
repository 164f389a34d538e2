//! Matte Model
//!
//! Defines the core data contracts for a two-layer composite:
//! - **Transform:** placement of the foreground relative to the background
//!   center (offset, uniform scale, rotation, opacity)
//! - **Geometry:** pixel sizes, the bounded display canvas, and the mapping
//!   of a display-space transform into source-space pixels
//!
//! Offsets are always expressed in pixels of *some* canvas. The preview
//! edits them in display space; export maps them into the background's
//! native resolution via [`geometry::to_source_space`].

pub mod geometry;
pub mod transform;

pub use geometry::*;
pub use transform::*;
