//! Matte Render Engine
//!
//! Turns two decoded layers and a placement transform into flattened
//! rasters, and ships them to disk.
//!
//! # Pipeline Architecture
//!
//! ```text
//! background ──┐
//!              ├── Stretch to canvas
//!              │         │
//! foreground ──┼─────────┼── Place (translate → rotate → scale)
//!              │         │         │
//! transform ───┘         │         ├── Source-over blend ──► composite
//!                        │         │
//!                        └─────────┴── Alpha threshold ────► mask
//!                                                  │
//!                                                  ▼
//!                                        Encode (PNG / JPEG)
//!                                                  │
//!                                                  ▼
//!                                             ExportSink
//! ```
//!
//! Every render is a pure function of its inputs and allocates a fresh
//! output buffer, so repeated and overlapping renders never observe each
//! other.

pub mod compositor;
pub mod export;
pub mod mask;
pub mod placement;
pub mod raster;
pub mod sink;

pub use compositor::{render, render_onto};
pub use export::*;
pub use mask::{binarize, render_mask, DEFAULT_ALPHA_THRESHOLD};
pub use raster::Raster;
pub use sink::{DirectorySink, ExportSink};
