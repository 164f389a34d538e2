//! Show image information and how it would be previewed.

use std::path::PathBuf;

use serde::Serialize;

use matte_common::config::AppConfig;
use matte_editor::{ImageAsset, ImageInfo, Upload};
use matte_model::geometry::{DisplayBounds, DisplayGeometry, Size};

#[derive(Serialize)]
struct ImageReport {
    #[serde(flatten)]
    info: ImageInfo,
    display: Size,
    scale_factor: f64,
    within_upload_limit: bool,
}

pub async fn run(config: &AppConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let upload = Upload::from_path(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let within_upload_limit = upload.byte_len() <= config.upload.max_bytes;

    // Report on oversized files too; only the editor enforces the limit.
    let asset = ImageAsset::decode(upload, u64::MAX)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e.user_message()))?;

    let bounds = DisplayBounds::new(
        config.preview.max_width as f64,
        config.preview.max_height as f64,
    )?;
    let geometry = DisplayGeometry::fit(asset.info.size, bounds)?;

    let report = ImageReport {
        info: asset.info,
        display: geometry.canvas_size(),
        scale_factor: geometry.scale_factor().sx,
        within_upload_limit,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Image: {}", report.info.name);
    println!("  Format: {}", report.info.format);
    println!(
        "  Dimensions: {} × {}",
        report.info.size.width, report.info.size.height
    );
    println!("  File size: {}", report.info.formatted_size());
    println!();
    println!("Preview:");
    println!(
        "  Canvas: {} × {}",
        report.display.width, report.display.height
    );
    println!("  Display to source scale: {:.4}", report.scale_factor);
    if !report.within_upload_limit {
        println!();
        println!("[WARN] Larger than the upload limit; the editor will reject it.");
    }

    Ok(())
}
