use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::Rgba;

use matte_common::clock::FixedClock;
use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::{display_geometry, Size};
use matte_model::transform::Transform;
use matte_render_engine::export::{
    export_both, export_composite, export_mask, run_export, ExportFormat, ExportKind,
    ExportRequest, ExportSettings,
};
use matte_render_engine::{render, DirectorySink, ExportSink, Raster};

const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn solid(w: u32, h: u32, color: Rgba<u8>) -> Arc<Raster> {
    Arc::new(Raster::filled(Size::new(w, h), color).unwrap())
}

fn fresh_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn scenario_request() -> ExportRequest {
    ExportRequest {
        background: Some(solid(1600, 1200, BLUE)),
        foreground: Some(solid(400, 400, RED)),
        transform: Transform {
            x: 100.0,
            y: 50.0,
            scale: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        },
    }
}

/// Delegates to a directory but refuses files with a given prefix.
struct PickySink {
    inner: DirectorySink,
    refuse_prefix: &'static str,
}

impl ExportSink for PickySink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> MatteResult<PathBuf> {
        if file_name.starts_with(self.refuse_prefix) {
            return Err(MatteError::export("disk full"));
        }
        self.inner.deliver(file_name, bytes)
    }

    fn retract(&self, path: &Path) -> MatteResult<()> {
        self.inner.retract(path)
    }

    fn name(&self) -> &str {
        "picky"
    }
}

#[tokio::test]
async fn scenario_export_maps_offset_to_native_resolution() {
    let dir = fresh_dir("matte_test_export_scenario");
    let request = scenario_request();
    let sink: Arc<dyn ExportSink> = Arc::new(DirectorySink::new(&dir));

    let bundle = export_both(
        &request,
        &ExportSettings::default(),
        sink,
        &FixedClock(1_700_000_000_000),
    )
    .await
    .unwrap();

    assert_eq!(bundle.composite.path, dir.join("composite_1700000000000.png"));
    assert_eq!(bundle.mask.path, dir.join("mask_1700000000000.png"));
    assert_eq!(bundle.composite.size, Size::new(1600, 1200));

    // Source offset is (200, 100): the 400x400 foreground spans
    // x in [800, 1200), y in [500, 900).
    let composite = Raster::decode(&std::fs::read(&bundle.composite.path).unwrap()).unwrap();
    assert_eq!(composite.size(), Size::new(1600, 1200));
    assert_eq!(composite.pixel(1000, 700), RED);
    assert_eq!(composite.pixel(800, 500), RED);
    assert_eq!(composite.pixel(1199, 899), RED);
    assert_eq!(composite.pixel(799, 700), BLUE);
    assert_eq!(composite.pixel(1200, 700), BLUE);
    assert_eq!(composite.pixel(1000, 499), BLUE);

    let mask = Raster::decode(&std::fs::read(&bundle.mask.path).unwrap()).unwrap();
    assert_eq!(mask.pixel(1000, 700), WHITE);
    assert_eq!(mask.pixel(800, 500), WHITE);
    assert_eq!(mask.pixel(799, 700), BLACK);
    assert_eq!(mask.pixel(1200, 899), BLACK);

    assert_eq!(
        files_in(&dir),
        vec![
            "composite_1700000000000.png".to_string(),
            "mask_1700000000000.png".to_string()
        ]
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn preview_and_export_agree_on_placement() {
    let request = scenario_request();
    let background = request.background.clone().unwrap();
    let foreground = request.foreground.clone().unwrap();

    let canvas = display_geometry(background.size()).unwrap().canvas_size();
    assert_eq!(canvas, Size::new(800, 600));
    let preview = render(&background, Some(&foreground), &request.transform, canvas).unwrap();

    let full = matte_render_engine::export::render_source_composite(
        &request,
        &ExportSettings::default(),
    )
    .unwrap();

    // Preview foreground spans [400, 600) x [250, 450); every preview
    // pixel maps onto the same layer at twice the coordinates.
    for (px, py) in [(400, 250), (599, 449), (500, 350), (399, 300), (600, 300)] {
        assert_eq!(
            preview.pixel(px, py),
            full.pixel(px * 2, py * 2),
            "display pixel ({px}, {py})"
        );
    }
}

#[tokio::test]
async fn composite_only_needs_background() {
    let dir = fresh_dir("matte_test_export_bg_only");
    let request = ExportRequest {
        background: Some(solid(30, 20, BLUE)),
        foreground: None,
        transform: Transform::IDENTITY,
    };
    let settings = ExportSettings {
        format: ExportFormat::Jpeg,
        ..ExportSettings::default()
    };

    let file = export_composite(
        &request,
        &settings,
        Arc::new(DirectorySink::new(&dir)),
        &FixedClock(7),
    )
    .await
    .unwrap();

    assert_eq!(file.path, dir.join("composite_7.jpg"));
    assert_eq!(file.format, ExportFormat::Jpeg);
    let bytes = std::fs::read(&file.path).unwrap();
    assert_eq!(bytes.len(), file.bytes);
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn mask_is_always_png() {
    let dir = fresh_dir("matte_test_export_mask_png");
    let request = ExportRequest {
        background: Some(solid(30, 20, BLUE)),
        foreground: Some(solid(5, 5, RED)),
        transform: Transform::IDENTITY,
    };
    let settings = ExportSettings {
        format: ExportFormat::Jpeg,
        ..ExportSettings::default()
    };

    let file = export_mask(
        &request,
        &settings,
        Arc::new(DirectorySink::new(&dir)),
        &FixedClock(9),
    )
    .await
    .unwrap();
    assert_eq!(file.path, dir.join("mask_9.png"));
    assert_eq!(file.format, ExportFormat::Png);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn missing_layers_reject_without_writing() {
    let dir = fresh_dir("matte_test_export_missing");
    let request = ExportRequest {
        background: Some(solid(10, 10, BLUE)),
        foreground: None,
        transform: Transform::IDENTITY,
    };

    for kind in [ExportKind::Mask, ExportKind::Both] {
        let err = run_export(
            kind,
            &request,
            &ExportSettings::default(),
            Arc::new(DirectorySink::new(&dir)),
            &FixedClock(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MatteError::RenderUnavailable { .. }));
        assert!(err.user_message().contains("foreground"));
    }

    assert!(!dir.exists());
}

#[tokio::test]
async fn combined_export_retracts_composite_when_mask_delivery_fails() {
    let dir = fresh_dir("matte_test_export_retract");
    std::fs::create_dir_all(&dir).unwrap();
    let request = ExportRequest {
        background: Some(solid(40, 30, BLUE)),
        foreground: Some(solid(8, 8, RED)),
        transform: Transform::IDENTITY,
    };
    let sink = Arc::new(PickySink {
        inner: DirectorySink::new(&dir),
        refuse_prefix: "mask",
    });

    let err = export_both(&request, &ExportSettings::default(), sink, &FixedClock(3))
        .await
        .unwrap_err();

    assert!(matches!(err, MatteError::Export { .. }));
    assert!(err.user_message().contains("mask"));
    assert!(files_in(&dir).is_empty(), "left behind: {:?}", files_in(&dir));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn overlapping_exports_complete_independently() {
    let dir = fresh_dir("matte_test_export_overlap");
    let request = ExportRequest {
        background: Some(solid(64, 48, BLUE)),
        foreground: Some(solid(10, 10, RED)),
        transform: Transform {
            rotation: 45.0,
            ..Transform::IDENTITY
        },
    };
    let settings = ExportSettings::default();
    let sink: Arc<dyn ExportSink> = Arc::new(DirectorySink::new(&dir));

    let (first, second) = tokio::join!(
        export_composite(&request, &settings, sink.clone(), &FixedClock(100)),
        export_mask(&request, &settings, sink.clone(), &FixedClock(200)),
    );

    assert!(first.unwrap().path.exists());
    assert!(second.unwrap().path.exists());
    assert_eq!(
        files_in(&dir),
        vec!["composite_100.png".to_string(), "mask_200.png".to_string()]
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn same_millisecond_exports_keep_both_files() {
    let dir = fresh_dir("matte_test_export_same_millis");
    let settings = ExportSettings::default();
    let sink: Arc<dyn ExportSink> = Arc::new(DirectorySink::new(&dir));
    let clock = FixedClock(5);

    let left = ExportRequest {
        transform: Transform {
            x: -20.0,
            ..Transform::IDENTITY
        },
        ..scenario_request()
    };
    let right = ExportRequest {
        transform: Transform {
            x: 20.0,
            ..Transform::IDENTITY
        },
        ..scenario_request()
    };

    let (first, second) = tokio::join!(
        export_composite(&left, &settings, sink.clone(), &clock),
        export_composite(&right, &settings, sink.clone(), &clock),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_ne!(first.path, second.path);
    assert_eq!(
        files_in(&dir),
        vec!["composite_5-1.png".to_string(), "composite_5.png".to_string()]
    );
    let a = std::fs::read(&first.path).unwrap();
    let b = std::fs::read(&second.path).unwrap();
    assert_ne!(a, b, "one export replaced the other");

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn combined_export_delivers_nothing_when_a_render_fails() {
    let dir = fresh_dir("matte_test_export_render_failure");
    // Wider than JPEG allows; the PNG mask still encodes.
    let request = ExportRequest {
        background: Some(solid(70_000, 1, BLUE)),
        foreground: Some(solid(1, 1, RED)),
        transform: Transform::IDENTITY,
    };
    let settings = ExportSettings {
        format: ExportFormat::Jpeg,
        ..ExportSettings::default()
    };
    let sink: Arc<dyn ExportSink> = Arc::new(DirectorySink::new(&dir));

    let err = export_both(&request, &settings, sink, &FixedClock(9))
        .await
        .unwrap_err();

    assert!(matches!(err, MatteError::Export { .. }));
    let message = err.user_message();
    assert!(message.contains("composite"), "{message}");
    assert!(!dir.exists());
}
