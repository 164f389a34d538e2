//! Export configuration and job execution.
//!
//! The live transform is edited on the display canvas. Export maps it to
//! the background's native pixels, renders at full resolution on the
//! blocking pool, encodes, and hands the bytes to an [`ExportSink`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use matte_common::clock::Clock;
use matte_common::config::AppConfig;
use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::{to_source_space_within, DisplayBounds, Size};
use matte_model::transform::Transform;

use crate::compositor;
use crate::mask::{self, DEFAULT_ALPHA_THRESHOLD};
use crate::raster::Raster;
use crate::sink::ExportSink;

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Lossless, keeps alpha.
    Png,
    /// Lossy, alpha flattened onto black.
    Jpeg,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Png)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPG",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = MatteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(MatteError::config(format!(
                "Unknown export format: {other}. Use: png, jpg"
            ))),
        }
    }
}

/// One exported image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Composite,
    Mask,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Composite => "composite",
            Self::Mask => "mask",
        })
    }
}

/// What an export request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Composite,
    Mask,
    Both,
}

impl ExportKind {
    /// Notification shown after a successful export.
    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Composite => "Composite image exported successfully!",
            Self::Mask => "Mask exported successfully!",
            Self::Both => "Both images exported successfully!",
        }
    }

    /// Notification shown when the export fails after rendering started.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Composite => "Failed to export composite image",
            Self::Mask => "Failed to export mask",
            Self::Both => "Failed to export images",
        }
    }
}

impl FromStr for ExportKind {
    type Err = MatteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "composite" => Ok(Self::Composite),
            "mask" => Ok(Self::Mask),
            "both" => Ok(Self::Both),
            other => Err(MatteError::invalid_input(format!(
                "Unknown export kind: {other}. Use: composite, mask, both"
            ))),
        }
    }
}

/// Export parameters.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Composite format. Masks are always PNG.
    pub format: ExportFormat,

    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// Mask alpha threshold (strictly greater is covered).
    pub alpha_threshold: u8,

    /// File name prefix for composites.
    pub composite_prefix: String,

    /// File name prefix for masks.
    pub mask_prefix: String,

    /// Preview bounds the live transform was edited in.
    pub bounds: DisplayBounds,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            jpeg_quality: 90,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            composite_prefix: "composite".to_string(),
            mask_prefix: "mask".to_string(),
            bounds: DisplayBounds::DEFAULT,
        }
    }
}

impl ExportSettings {
    /// Build settings from the application config.
    pub fn from_config(config: &AppConfig) -> MatteResult<Self> {
        let bounds = DisplayBounds::new(
            config.preview.max_width as f64,
            config.preview.max_height as f64,
        )
        .map_err(|e| MatteError::config(e.to_string()))?;

        Ok(Self {
            format: config.export.format.parse()?,
            jpeg_quality: config.export.jpeg_quality,
            alpha_threshold: config.export.alpha_threshold,
            composite_prefix: config.export.composite_prefix.clone(),
            mask_prefix: config.export.mask_prefix.clone(),
            bounds,
        })
    }

    fn prefix(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Composite => &self.composite_prefix,
            ArtifactKind::Mask => &self.mask_prefix,
        }
    }

    fn format_for(&self, kind: ArtifactKind) -> ExportFormat {
        match kind {
            ArtifactKind::Composite => self.format,
            ArtifactKind::Mask => ExportFormat::Png,
        }
    }
}

/// Snapshot of the session taken when export is requested.
///
/// Layers are shared handles, so the session may replace its images while
/// the export is still running without affecting it.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub background: Option<Arc<Raster>>,
    pub foreground: Option<Arc<Raster>>,
    /// Display-space transform.
    pub transform: Transform,
}

impl ExportRequest {
    /// The live transform mapped into the background's native pixels.
    pub fn source_transform(&self, bounds: DisplayBounds) -> MatteResult<Transform> {
        let background = self.require_background()?;
        to_source_space_within(&self.transform, background.size(), bounds)
            .map_err(|e| MatteError::render(e.to_string()))
    }

    fn require_background(&self) -> MatteResult<&Arc<Raster>> {
        self.background
            .as_ref()
            .ok_or_else(|| MatteError::render_unavailable("No background image to export"))
    }

    fn require_layers(&self, context: &str) -> MatteResult<(&Arc<Raster>, &Arc<Raster>)> {
        match (&self.background, &self.foreground) {
            (Some(bg), Some(fg)) => Ok((bg, fg)),
            (bg, fg) => {
                let mut missing = Vec::new();
                if bg.is_none() {
                    missing.push("background");
                }
                if fg.is_none() {
                    missing.push("foreground");
                }
                Err(MatteError::render_unavailable(format!(
                    "{context} (missing: {})",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Check that `kind` has the images it needs.
    pub fn check(&self, kind: ExportKind) -> MatteResult<()> {
        match kind {
            ExportKind::Composite => self.require_background().map(|_| ()),
            ExportKind::Mask => self
                .require_layers("Need both background and foreground images to generate mask")
                .map(|_| ()),
            ExportKind::Both => self.require_layers("Need both images to export").map(|_| ()),
        }
    }
}

/// A delivered export file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub format: ExportFormat,
    /// Pixel size (the background's native size).
    pub size: Size,
    /// Encoded length in bytes.
    pub bytes: usize,
}

#[derive(Debug)]
struct EncodedArtifact {
    kind: ArtifactKind,
    format: ExportFormat,
    size: Size,
    data: Vec<u8>,
}

/// `<prefix>_<millis>.<ext>`
pub fn export_file_name(prefix: &str, stamp_millis: i64, format: ExportFormat) -> String {
    format!("{prefix}_{stamp_millis}.{}", format.extension())
}

/// Encode a raster. JPEG output flattens alpha onto black.
pub fn encode(raster: &Raster, format: ExportFormat, jpeg_quality: u8) -> MatteResult<Vec<u8>> {
    let pixels = raster.pixels();
    let mut out = Vec::new();

    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out)
                .write_image(
                    pixels.as_raw(),
                    pixels.width(),
                    pixels.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| MatteError::export(format!("PNG encoding failed: {e}")))?;
        }
        ExportFormat::Jpeg => {
            let rgb = RgbImage::from_fn(pixels.width(), pixels.height(), |x, y| {
                let p = pixels.get_pixel(x, y);
                let a = p[3] as u32;
                let flatten = |c: u8| ((c as u32 * a + 127) / 255) as u8;
                image::Rgb([flatten(p[0]), flatten(p[1]), flatten(p[2])])
            });
            JpegEncoder::new_with_quality(&mut out, jpeg_quality.clamp(1, 100))
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                )
                .map_err(|e| MatteError::export(format!("JPEG encoding failed: {e}")))?;
        }
    }

    Ok(out)
}

/// Render the composite at the background's native resolution.
pub fn render_source_composite(
    request: &ExportRequest,
    settings: &ExportSettings,
) -> MatteResult<Raster> {
    let background = request.require_background()?;
    let transform = request.source_transform(settings.bounds)?;
    compositor::render(
        background,
        request.foreground.as_deref(),
        &transform,
        background.size(),
    )
}

/// Render the mask at the background's native resolution.
pub fn render_source_mask(
    request: &ExportRequest,
    settings: &ExportSettings,
) -> MatteResult<Raster> {
    let (background, foreground) =
        request.require_layers("Need both background and foreground images to generate mask")?;
    let transform = request.source_transform(settings.bounds)?;
    mask::render_mask(
        background,
        foreground,
        &transform,
        background.size(),
        settings.alpha_threshold,
    )
}

fn render_and_encode(
    kind: ArtifactKind,
    request: &ExportRequest,
    settings: &ExportSettings,
) -> MatteResult<EncodedArtifact> {
    let started = std::time::Instant::now();
    let raster = match kind {
        ArtifactKind::Composite => render_source_composite(request, settings)?,
        ArtifactKind::Mask => render_source_mask(request, settings)?,
    };
    let format = settings.format_for(kind);
    let data = encode(&raster, format, settings.jpeg_quality)?;

    tracing::debug!(
        kind = %kind,
        format = %format,
        size = %raster.size(),
        bytes = data.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rendered export artifact"
    );

    Ok(EncodedArtifact {
        kind,
        format,
        size: raster.size(),
        data,
    })
}

async fn render_blocking(
    kind: ArtifactKind,
    request: ExportRequest,
    settings: ExportSettings,
) -> MatteResult<EncodedArtifact> {
    tokio::task::spawn_blocking(move || render_and_encode(kind, &request, &settings))
        .await
        .map_err(|e| MatteError::export(format!("{kind} render task failed: {e}")))?
}

async fn deliver_blocking(
    sink: Arc<dyn ExportSink>,
    file_name: String,
    artifact: EncodedArtifact,
) -> MatteResult<ExportedFile> {
    let kind = artifact.kind;
    tokio::task::spawn_blocking(move || {
        let path = sink.deliver(&file_name, &artifact.data)?;
        tracing::info!(
            kind = %artifact.kind,
            sink = sink.name(),
            path = %path.display(),
            "Export delivered"
        );
        Ok(ExportedFile {
            kind: artifact.kind,
            path,
            format: artifact.format,
            size: artifact.size,
            bytes: artifact.data.len(),
        })
    })
    .await
    .map_err(|e| MatteError::export(format!("{kind} delivery task failed: {e}")))?
}

async fn export_single(
    kind: ArtifactKind,
    request: &ExportRequest,
    settings: &ExportSettings,
    sink: Arc<dyn ExportSink>,
    clock: &dyn Clock,
) -> MatteResult<ExportedFile> {
    let artifact = render_blocking(kind, request.clone(), settings.clone()).await?;
    let name = export_file_name(
        settings.prefix(kind),
        clock.now_millis(),
        settings.format_for(kind),
    );
    deliver_blocking(sink, name, artifact).await
}

/// Export the composite (background required, foreground optional).
pub async fn export_composite(
    request: &ExportRequest,
    settings: &ExportSettings,
    sink: Arc<dyn ExportSink>,
    clock: &dyn Clock,
) -> MatteResult<ExportedFile> {
    request.check(ExportKind::Composite)?;
    tracing::info!(format = %settings.format, "Starting composite export");
    export_single(ArtifactKind::Composite, request, settings, sink, clock).await
}

/// Export the mask (both layers required).
pub async fn export_mask(
    request: &ExportRequest,
    settings: &ExportSettings,
    sink: Arc<dyn ExportSink>,
    clock: &dyn Clock,
) -> MatteResult<ExportedFile> {
    request.check(ExportKind::Mask)?;
    tracing::info!(
        alpha_threshold = settings.alpha_threshold,
        "Starting mask export"
    );
    export_single(ArtifactKind::Mask, request, settings, sink, clock).await
}

/// Composite and mask delivered together.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    pub composite: ExportedFile,
    pub mask: ExportedFile,
}

/// Export composite and mask together.
///
/// Both artifacts render concurrently. Nothing is delivered unless both
/// render and encode; if the second delivery fails the first file is
/// retracted. Both files share one timestamp.
pub async fn export_both(
    request: &ExportRequest,
    settings: &ExportSettings,
    sink: Arc<dyn ExportSink>,
    clock: &dyn Clock,
) -> MatteResult<ExportBundle> {
    request.check(ExportKind::Both)?;
    tracing::info!(format = %settings.format, "Starting combined export");

    let (composite, mask) = tokio::join!(
        render_blocking(ArtifactKind::Composite, request.clone(), settings.clone()),
        render_blocking(ArtifactKind::Mask, request.clone(), settings.clone()),
    );

    let (composite, mask) = match (composite, mask) {
        (Ok(c), Ok(m)) => (c, m),
        (composite, mask) => {
            let failures = [
                (ArtifactKind::Composite, composite.err()),
                (ArtifactKind::Mask, mask.err()),
            ]
            .into_iter()
            .filter_map(|(kind, err)| err.map(|e| format!("{kind}: {}", e.user_message())))
            .collect::<Vec<_>>();
            tracing::warn!(failures = ?failures, "Combined export aborted before delivery");
            return Err(MatteError::export(format!(
                "Combined export failed ({})",
                failures.join("; ")
            )));
        }
    };

    let stamp = clock.now_millis();
    let composite_name = export_file_name(
        &settings.composite_prefix,
        stamp,
        settings.format_for(ArtifactKind::Composite),
    );
    let mask_name = export_file_name(
        &settings.mask_prefix,
        stamp,
        settings.format_for(ArtifactKind::Mask),
    );

    let composite = deliver_blocking(sink.clone(), composite_name, composite).await?;
    let mask = match deliver_blocking(sink.clone(), mask_name, mask).await {
        Ok(mask) => mask,
        Err(e) => {
            if let Err(retract_err) = sink.retract(&composite.path) {
                tracing::warn!(
                    path = %composite.path.display(),
                    error = %retract_err,
                    "Failed to retract composite after mask delivery failure"
                );
            }
            return Err(MatteError::export(format!(
                "Combined export failed (mask: {})",
                e.user_message()
            )));
        }
    };

    Ok(ExportBundle { composite, mask })
}

/// Run an export of `kind`, returning the delivered files.
pub async fn run_export(
    kind: ExportKind,
    request: &ExportRequest,
    settings: &ExportSettings,
    sink: Arc<dyn ExportSink>,
    clock: &dyn Clock,
) -> MatteResult<Vec<ExportedFile>> {
    match kind {
        ExportKind::Composite => Ok(vec![
            export_composite(request, settings, sink, clock).await?,
        ]),
        ExportKind::Mask => Ok(vec![export_mask(request, settings, sink, clock).await?]),
        ExportKind::Both => {
            let bundle = export_both(request, settings, sink, clock).await?;
            Ok(vec![bundle.composite, bundle.mask])
        }
    }
}
