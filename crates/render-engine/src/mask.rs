//! Binary occupancy mask of the placed foreground.
//!
//! The mask answers "where does the foreground cover the background", so
//! it shares the compositor's geometry but ignores opacity: a fully faded
//! foreground still occupies its silhouette.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::Size;
use matte_model::transform::Transform;

use crate::placement::Placement;
use crate::raster::Raster;

/// Alpha a foreground pixel must exceed to count as covered.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Threshold a foreground's alpha channel at native resolution.
///
/// `alpha > threshold` becomes opaque white, everything else opaque black.
pub fn binarize(foreground: &Raster, threshold: u8) -> RgbaImage {
    let src = foreground.pixels();
    RgbaImage::from_fn(src.width(), src.height(), |x, y| {
        if src.get_pixel(x, y)[3] > threshold {
            WHITE
        } else {
            BLACK
        }
    })
}

/// Render the foreground's silhouette on a black canvas.
///
/// `background` only contributes its native size, which fixes the
/// foreground's rendered size exactly as in [`crate::compositor::render`].
/// Sampling is nearest-neighbour so the result stays strictly black and
/// white.
pub fn render_mask(
    background: &Raster,
    foreground: &Raster,
    transform: &Transform,
    canvas: Size,
    alpha_threshold: u8,
) -> MatteResult<Raster> {
    if canvas.is_empty() {
        return Err(MatteError::render(format!(
            "Canvas dimensions must be non-zero (got {canvas})"
        )));
    }

    let mut out = RgbaImage::from_pixel(canvas.width, canvas.height, BLACK);
    let silhouette = binarize(foreground, alpha_threshold);

    let Some(placement) =
        Placement::resolve(transform, canvas, background.size(), foreground.size())
    else {
        tracing::debug!(?transform, "mask placement is degenerate, canvas stays black");
        return Raster::new(out);
    };

    let bounds = placement.canvas_bounds(canvas);
    if bounds.is_empty() {
        return Raster::new(out);
    }

    let src_w = silhouette.width() as f64;
    let src_h = silhouette.height() as f64;
    let src_stride = silhouette.width() as usize * 4;
    let src_raw = silhouette.as_raw();

    let row_bytes = canvas.width as usize * 4;
    let dst_raw: &mut [u8] = &mut out;

    dst_raw
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(bounds.y0 as usize)
        .take((bounds.y1 - bounds.y0) as usize)
        .for_each(|(dy, row)| {
            let cy = dy as f64 + 0.5;
            for dx in bounds.x0 as usize..bounds.x1 as usize {
                let (u, v) = placement.to_foreground(dx as f64 + 0.5, cy);
                if !(u >= 0.0 && v >= 0.0 && u < src_w && v < src_h) {
                    continue;
                }
                let idx = v as usize * src_stride + u as usize * 4;
                // Covered pixels are white; uncovered ones are drawn black
                // over black, which changes nothing.
                if src_raw[idx] == 255 {
                    row[dx * 4..dx * 4 + 4].copy_from_slice(&WHITE.0);
                }
            }
        });

    tracing::debug!(
        canvas = %canvas,
        foreground = %foreground.size(),
        alpha_threshold,
        "rendered mask"
    );

    Raster::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(w: u32, h: u32, color: Rgba<u8>) -> Raster {
        Raster::filled(Size::new(w, h), color).unwrap()
    }

    fn is_binary(raster: &Raster) -> bool {
        raster
            .pixels()
            .pixels()
            .all(|p| *p == WHITE || *p == BLACK)
    }

    #[test]
    fn test_threshold_is_strictly_greater() {
        let mut pixels = RgbaImage::new(4, 1);
        for (i, alpha) in [0u8, 127, 128, 255].into_iter().enumerate() {
            pixels.put_pixel(i as u32, 0, Rgba([90, 90, 90, alpha]));
        }
        let fg = Raster::new(pixels).unwrap();

        let mask = binarize(&fg, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(mask.get_pixel(0, 0), &BLACK);
        assert_eq!(mask.get_pixel(1, 0), &BLACK);
        assert_eq!(mask.get_pixel(2, 0), &BLACK);
        assert_eq!(mask.get_pixel(3, 0), &WHITE);
    }

    #[test]
    fn test_threshold_scenario_at_same_position() {
        // Same placement, four foregrounds differing only in alpha.
        let bg = solid(10, 10, Rgba([5, 5, 5, 255]));
        let expected = [BLACK, BLACK, BLACK, WHITE];
        for (alpha, want) in [0u8, 127, 128, 255].into_iter().zip(expected) {
            let fg = solid(2, 2, Rgba([255, 0, 0, alpha]));
            let mask =
                render_mask(&bg, &fg, &Transform::IDENTITY, Size::new(10, 10), 128).unwrap();
            assert_eq!(mask.pixel(5, 5), want, "alpha {alpha}");
        }
    }

    #[test]
    fn test_lower_threshold_admits_more() {
        let fg = solid(1, 1, Rgba([0, 0, 0, 128]));
        assert_eq!(binarize(&fg, 127).get_pixel(0, 0), &WHITE);
    }

    #[test]
    fn test_mask_ignores_opacity() {
        let bg = solid(20, 20, Rgba([0, 200, 0, 255]));
        let fg = solid(6, 6, Rgba([255, 0, 0, 255]));
        let t = Transform {
            x: 3.0,
            y: 2.0,
            opacity: 0.0,
            ..Transform::IDENTITY
        };
        let mask = render_mask(&bg, &fg, &t, Size::new(20, 20), 128).unwrap();

        // Foreground covers x in [10, 16), y in [9, 15).
        for y in 0..20 {
            for x in 0..20 {
                let covered = (10..16).contains(&x) && (9..15).contains(&y);
                let want = if covered { WHITE } else { BLACK };
                assert_eq!(mask.pixel(x, y), want, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_mask_follows_source_scale() {
        // Rendered at native 1600x1200 the 400x400 foreground keeps its
        // size; shrink everything by 100 for the test.
        let bg = solid(16, 12, BLACK);
        let fg = solid(4, 4, WHITE);
        let t = Transform {
            x: 2.0,
            y: 1.0,
            ..Transform::IDENTITY
        };
        let mask = render_mask(&bg, &fg, &t, Size::new(16, 12), 128).unwrap();
        assert_eq!(mask.pixel(8, 5), WHITE);
        assert_eq!(mask.pixel(11, 8), WHITE);
        assert_eq!(mask.pixel(7, 5), BLACK);
        assert_eq!(mask.pixel(12, 8), BLACK);
    }

    #[test]
    fn test_offcanvas_mask_is_black() {
        let bg = solid(10, 10, BLACK);
        let fg = solid(3, 3, WHITE);
        let t = Transform {
            x: -500.0,
            ..Transform::IDENTITY
        };
        let mask = render_mask(&bg, &fg, &t, Size::new(10, 10), 128).unwrap();
        assert!(mask.pixels().pixels().all(|p| *p == BLACK));
    }

    proptest! {
        #[test]
        fn prop_mask_is_strictly_binary(
            alphas in proptest::collection::vec(any::<u8>(), 36),
            x in -8.0f64..8.0,
            y in -8.0f64..8.0,
            scale in 0.2f64..3.0,
            rotation in 0.0f64..360.0,
            opacity in 0.0f64..1.0,
            threshold in any::<u8>(),
        ) {
            let fg_pixels = RgbaImage::from_fn(6, 6, |px, py| {
                Rgba([77, 150, 20, alphas[(py * 6 + px) as usize]])
            });
            let fg = Raster::new(fg_pixels).unwrap();
            let bg = solid(24, 18, Rgba([30, 60, 90, 255]));
            let t = Transform { x, y, scale, rotation, opacity };

            let mask = render_mask(&bg, &fg, &t, Size::new(24, 18), threshold).unwrap();
            prop_assert!(is_binary(&mask));
        }
    }
}
