//! One editing session: two image slots, the live transform, the preview,
//! and export on demand.

use std::sync::Arc;

use serde::Serialize;

use matte_common::clock::Clock;
use matte_common::config::AppConfig;
use matte_common::error::{MatteError, MatteResult};
use matte_model::transform::{Transform, TransformPatch};
use matte_render_engine::export::{
    encode, run_export, ExportFormat, ExportKind, ExportRequest, ExportSettings, ExportedFile,
};
use matte_render_engine::{ExportSink, Raster};

use crate::controls::Control;
use crate::notice::Notice;
use crate::preview::{CanvasStatus, Point, PreviewSurface, Zoom};
use crate::state::TransformModel;
use crate::upload::{ImageAsset, Slot, Upload};

const NO_BACKGROUND_HINT: &str = "Upload a background image to enable export options";
const NO_FOREGROUND_HINT: &str = "Upload a foreground image to enable mask generation";
const NO_CONTROLS_HINT: &str = "Upload a foreground image to access transformation controls";

/// Which exports the current slots allow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub composite: bool,
    pub mask: bool,
    pub both: bool,
    /// What to upload next, if anything is disabled.
    pub hint: Option<&'static str>,
}

impl Availability {
    pub fn allows(&self, kind: ExportKind) -> bool {
        match kind {
            ExportKind::Composite => self.composite,
            ExportKind::Mask => self.mask,
            ExportKind::Both => self.both,
        }
    }
}

#[derive(Debug)]
pub struct EditSession {
    config: AppConfig,
    settings: ExportSettings,
    background: Option<ImageAsset>,
    foreground: Option<ImageAsset>,
    model: TransformModel,
    preview: PreviewSurface,
}

impl EditSession {
    pub fn new(config: AppConfig) -> MatteResult<Self> {
        let settings = ExportSettings::from_config(&config)?;
        let model = TransformModel::new();
        let preview = PreviewSurface::new(
            model.subscribe(),
            settings.bounds,
            Zoom::from_config(&config.preview),
        );

        Ok(Self {
            config,
            settings,
            background: None,
            foreground: None,
            model,
            preview,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn set_format(&mut self, format: ExportFormat) {
        self.settings.format = format;
    }

    pub fn image(&self, slot: Slot) -> Option<&ImageAsset> {
        match slot {
            Slot::Background => self.background.as_ref(),
            Slot::Foreground => self.foreground.as_ref(),
        }
    }

    pub fn transform(&self) -> Transform {
        self.model.current()
    }

    /// Validate and decode `upload`, then install it in `slot`.
    ///
    /// Nothing changes unless every step succeeds; the slot keeps whatever
    /// it held before.
    pub async fn load(&mut self, slot: Slot, upload: Upload) -> MatteResult<Notice> {
        let name = upload.name.clone();
        let asset = match ImageAsset::decode(upload, self.config.upload.max_bytes).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!(%slot, file = %name, error = %e, "Rejected image upload");
                return Err(e);
            }
        };

        match slot {
            Slot::Background => {
                self.preview.set_background(asset.raster.clone())?;
                self.background = Some(asset);
            }
            Slot::Foreground => {
                self.preview.set_foreground(Some(asset.raster.clone()));
                self.foreground = Some(asset);
            }
        }

        if let Some(asset) = self.image(slot) {
            tracing::info!(
                %slot,
                file = %asset.info.name,
                size = %asset.info.size,
                bytes = asset.info.byte_len,
                "Image loaded"
            );
        }
        Ok(Notice::success(format!(
            "{} image loaded successfully!",
            slot.title()
        )))
    }

    /// [`load`](Self::load) with failures turned into an error notice.
    pub async fn load_notice(&mut self, slot: Slot, upload: Upload) -> Notice {
        self.load(slot, upload).await.unwrap_or_else(Notice::from)
    }

    /// Drop the image in `slot`.
    pub fn clear(&mut self, slot: Slot) -> Notice {
        let removed = match slot {
            Slot::Background => {
                self.preview.clear_background();
                self.background.take()
            }
            Slot::Foreground => {
                self.preview.set_foreground(None);
                self.foreground.take()
            }
        };

        match removed {
            Some(asset) => {
                tracing::info!(%slot, file = %asset.info.name, "Image cleared");
                Notice::info(format!("{} image removed", slot.title()))
            }
            None => Notice::info(format!("No {slot} image to remove")),
        }
    }

    pub fn update(&mut self, patch: &TransformPatch) -> Transform {
        self.model.update(patch)
    }

    /// Set one control, clamped to its range. Needs a foreground.
    pub fn set_control(&mut self, control: Control, value: f64) -> MatteResult<Transform> {
        if self.foreground.is_none() {
            return Err(MatteError::invalid_input(NO_CONTROLS_HINT));
        }
        let patch = control.patch(value)?;
        Ok(self.model.update(&patch))
    }

    pub fn reset(&mut self) -> Transform {
        self.model.reset()
    }

    pub fn pointer_down(&mut self, pointer: Point) -> bool {
        self.preview.pointer_down(pointer)
    }

    /// Apply a drag step. Returns the new transform while dragging.
    pub fn pointer_move(&mut self, pointer: Point) -> Option<Transform> {
        let patch = self.preview.pointer_move(pointer)?;
        Some(self.model.update(&patch))
    }

    pub fn pointer_up(&mut self) {
        self.preview.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.preview.pointer_leave();
    }

    pub fn zoom_in(&mut self) -> u32 {
        self.preview.zoom_mut().zoom_in();
        self.preview.zoom().percent()
    }

    pub fn zoom_out(&mut self) -> u32 {
        self.preview.zoom_mut().zoom_out();
        self.preview.zoom().percent()
    }

    pub fn preview(&mut self) -> MatteResult<Option<&Raster>> {
        self.preview.frame()
    }

    pub fn preview_surface(&self) -> &PreviewSurface {
        &self.preview
    }

    /// The current preview frame as PNG bytes.
    pub fn preview_png(&mut self) -> MatteResult<Vec<u8>> {
        let frame = self
            .preview
            .frame()?
            .ok_or_else(|| MatteError::render_unavailable("No background image to preview"))?;
        encode(frame, ExportFormat::Png, self.settings.jpeg_quality)
    }

    pub fn status(&self) -> CanvasStatus {
        self.preview.status()
    }

    pub fn availability(&self) -> Availability {
        let has_bg = self.background.is_some();
        let has_fg = self.foreground.is_some();
        let hint = if !has_bg {
            Some(NO_BACKGROUND_HINT)
        } else if !has_fg {
            Some(NO_FOREGROUND_HINT)
        } else {
            None
        };
        Availability {
            composite: has_bg,
            mask: has_bg && has_fg,
            both: has_bg && has_fg,
            hint,
        }
    }

    /// Snapshot of the layers and transform for an export.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            background: self.background.as_ref().map(|a| Arc::clone(&a.raster)),
            foreground: self.foreground.as_ref().map(|a| Arc::clone(&a.raster)),
            transform: self.model.current(),
        }
    }

    pub async fn export(
        &self,
        kind: ExportKind,
        sink: Arc<dyn ExportSink>,
        clock: &dyn Clock,
    ) -> MatteResult<Vec<ExportedFile>> {
        let request = self.export_request();
        run_export(kind, &request, &self.settings, sink, clock).await
    }

    /// [`export`](Self::export) reported as a notice.
    pub async fn export_notice(
        &self,
        kind: ExportKind,
        sink: Arc<dyn ExportSink>,
        clock: &dyn Clock,
    ) -> Notice {
        match self.export(kind, sink, clock).await {
            Ok(files) => {
                tracing::info!(?kind, files = files.len(), "Export finished");
                Notice::success(kind.success_message())
            }
            Err(e @ MatteError::RenderUnavailable { .. }) => Notice::from(e),
            Err(e) => {
                tracing::error!(?kind, error = %e, "Export failed");
                Notice::error(format!("{}: {}", kind.failure_message(), e.user_message()))
            }
        }
    }
}
