//! Matte Editor
//!
//! The interactive half of Matte. An [`session::EditSession`] owns the two
//! image slots, the live [`state::TransformModel`], and a
//! [`preview::PreviewSurface`] that re-renders whenever either changes.
//! Uploads are validated before anything is touched and decoded on the
//! blocking pool; every failure comes back as a [`notice::Notice`] so the
//! session itself never ends up half-updated.

pub mod controls;
pub mod notice;
pub mod preview;
pub mod session;
pub mod state;
pub mod upload;

pub use controls::{Control, ControlRange};
pub use notice::{Notice, NoticeLevel};
pub use preview::{CanvasStatus, Point, PreviewSurface, Zoom};
pub use session::{Availability, EditSession};
pub use state::TransformModel;
pub use upload::{format_file_size, ImageAsset, ImageInfo, Slot, Upload};
