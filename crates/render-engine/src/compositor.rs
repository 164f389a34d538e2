//! Layer compositor: background stretched to the canvas, foreground placed
//! and alpha-blended on top.

use rayon::prelude::*;

use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::Size;
use matte_model::transform::Transform;

use crate::placement::Placement;
use crate::raster::Raster;

/// Composite `foreground` over `background` on a canvas of `canvas` pixels.
///
/// The background is stretched to fill the canvas exactly; callers choose a
/// canvas matching the background's aspect ratio (the display geometry for
/// previews, the native size for export). The foreground is placed with
/// `transform`, whose offsets must be expressed in this canvas's pixels.
pub fn render(
    background: &Raster,
    foreground: Option<&Raster>,
    transform: &Transform,
    canvas: Size,
) -> MatteResult<Raster> {
    if canvas.is_empty() {
        return Err(MatteError::render(format!(
            "Canvas dimensions must be non-zero (got {canvas})"
        )));
    }
    let stretched = background.stretched(canvas)?;
    render_onto(&stretched, background.size(), foreground, transform)
}

/// Composite onto a background that is already canvas-sized.
///
/// `background_native` is the background's original size, which fixes the
/// foreground's rendered size. The preview keeps a display-sized copy of
/// the background and calls this directly instead of re-stretching the
/// native image on every frame.
pub fn render_onto(
    stretched_background: &Raster,
    background_native: Size,
    foreground: Option<&Raster>,
    transform: &Transform,
) -> MatteResult<Raster> {
    let canvas = stretched_background.size();
    let mut out = stretched_background.pixels().clone();

    let Some(foreground) = foreground else {
        return Raster::new(out);
    };

    let Some(placement) = Placement::resolve(transform, canvas, background_native, foreground.size())
    else {
        tracing::debug!(?transform, "foreground placement is degenerate, skipping draw");
        return Raster::new(out);
    };

    let opacity = if transform.opacity.is_finite() {
        transform.opacity.clamp(0.0, 1.0) as f32
    } else {
        1.0
    };
    if opacity <= 0.0 {
        return Raster::new(out);
    }

    let bounds = placement.canvas_bounds(canvas);
    if bounds.is_empty() {
        return Raster::new(out);
    }

    let src = foreground.pixels();
    let src_w = src.width() as i32;
    let src_h = src.height() as i32;
    let src_stride = src_w as usize * 4;
    let src_raw = src.as_raw();

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

                // Sample at texel centers.
                let sx = u - 0.5;
                let sy = v - 0.5;
                let x0 = sx.floor() as i32;
                let y0 = sy.floor() as i32;
                if x0 < -1 || y0 < -1 || x0 >= src_w || y0 >= src_h {
                    continue;
                }
                let fx = (sx - x0 as f64) as f32;
                let fy = (sy - y0 as f64) as f32;

                let sample = |px: i32, py: i32| -> [f32; 4] {
                    if px < 0 || py < 0 || px >= src_w || py >= src_h {
                        [0.0; 4]
                    } else {
                        let idx = py as usize * src_stride + px as usize * 4;
                        [
                            src_raw[idx] as f32,
                            src_raw[idx + 1] as f32,
                            src_raw[idx + 2] as f32,
                            src_raw[idx + 3] as f32,
                        ]
                    }
                };

                let tl = sample(x0, y0);
                let tr = sample(x0 + 1, y0);
                let bl = sample(x0, y0 + 1);
                let br = sample(x0 + 1, y0 + 1);

                let mut texel = [0.0f32; 4];
                for c in 0..4 {
                    let top = tl[c] + (tr[c] - tl[c]) * fx;
                    let bot = bl[c] + (br[c] - bl[c]) * fx;
                    texel[c] = top + (bot - top) * fy;
                }

                let px = dx * 4;
                blend_over(&mut row[px..px + 4], texel, opacity);
            }
        });

    tracing::debug!(
        canvas = %canvas,
        foreground = %foreground.size(),
        x = transform.x,
        y = transform.y,
        scale = transform.scale,
        rotation = transform.rotation,
        opacity = transform.opacity,
        "composited foreground"
    );

    Raster::new(out)
}

/// Porter-Duff source-over with straight (non-premultiplied) alpha.
fn blend_over(dst: &mut [u8], src: [f32; 4], opacity: f32) {
    let sa = (src[3] / 255.0) * opacity;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    for c in 0..3 {
        let value = (src[c] * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn solid(w: u32, h: u32, color: Rgba<u8>) -> Raster {
        Raster::filled(Size::new(w, h), color).unwrap()
    }

    #[test]
    fn test_background_only() {
        let bg = solid(40, 30, BLUE);
        let out = render(&bg, None, &Transform::IDENTITY, Size::new(40, 30)).unwrap();
        assert_eq!(out, bg);
    }

    #[test]
    fn test_identity_places_centered_copy() {
        let bg = solid(100, 100, BLUE);
        let fg = solid(20, 10, RED);
        let out = render(&bg, Some(&fg), &Transform::IDENTITY, Size::new(100, 100)).unwrap();

        for y in 0..100 {
            for x in 0..100 {
                let inside = (40..60).contains(&x) && (45..55).contains(&y);
                let expected = if inside { RED } else { BLUE };
                assert_eq!(out.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_offset_moves_foreground() {
        let bg = solid(100, 100, BLUE);
        let fg = solid(10, 10, RED);
        let t = Transform {
            x: 20.0,
            y: -30.0,
            ..Transform::IDENTITY
        };
        let out = render(&bg, Some(&fg), &t, Size::new(100, 100)).unwrap();
        assert_eq!(out.pixel(70, 20), RED);
        assert_eq!(out.pixel(50, 50), BLUE);
    }

    #[test]
    fn test_opacity_blends() {
        let bg = solid(10, 10, Rgba([0, 0, 0, 255]));
        let fg = solid(10, 10, Rgba([200, 100, 0, 255]));
        let t = Transform {
            opacity: 0.5,
            ..Transform::IDENTITY
        };
        let out = render(&bg, Some(&fg), &t, Size::new(10, 10)).unwrap();
        assert_eq!(out.pixel(5, 5), Rgba([100, 50, 0, 255]));
    }

    #[test]
    fn test_zero_opacity_leaves_background() {
        let bg = solid(10, 10, BLUE);
        let fg = solid(4, 4, RED);
        let t = Transform {
            opacity: 0.0,
            ..Transform::IDENTITY
        };
        let out = render(&bg, Some(&fg), &t, Size::new(10, 10)).unwrap();
        assert_eq!(out, bg);
    }

    #[test]
    fn test_transparent_foreground_pixels_show_background() {
        let bg = solid(10, 10, BLUE);
        let fg = solid(10, 10, Rgba([255, 0, 0, 0]));
        let out = render(&bg, Some(&fg), &Transform::IDENTITY, Size::new(10, 10)).unwrap();
        assert_eq!(out, bg);
    }

    #[test]
    fn test_display_canvas_scales_foreground_with_background() {
        // 200x200 background previewed at 100x100: a 40x40 foreground
        // renders as 20x20.
        let bg = solid(200, 200, BLUE);
        let fg = solid(40, 40, RED);
        let out = render(&bg, Some(&fg), &Transform::IDENTITY, Size::new(100, 100)).unwrap();
        assert_eq!(out.size(), Size::new(100, 100));
        assert_eq!(out.pixel(41, 41), RED);
        assert_eq!(out.pixel(58, 58), RED);
        assert_eq!(out.pixel(38, 50), BLUE);
        assert_eq!(out.pixel(61, 50), BLUE);
    }

    #[test]
    fn test_quarter_turn_swaps_extent() {
        let bg = solid(100, 100, BLUE);
        let fg = solid(40, 10, RED);
        let t = Transform {
            rotation: 90.0,
            ..Transform::IDENTITY
        };
        let out = render(&bg, Some(&fg), &t, Size::new(100, 100)).unwrap();
        // Now 10 wide, 40 tall.
        assert_eq!(out.pixel(50, 32), RED);
        assert_eq!(out.pixel(50, 67), RED);
        assert_eq!(out.pixel(40, 50), BLUE);
        assert_eq!(out.pixel(60, 50), BLUE);
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut bg_pixels = image::RgbaImage::new(64, 48);
        for (x, y, p) in bg_pixels.enumerate_pixels_mut() {
            *p = Rgba([(x * 4) as u8, (y * 5) as u8, 90, 255]);
        }
        let bg = Raster::new(bg_pixels).unwrap();
        let mut fg_pixels = image::RgbaImage::new(17, 11);
        for (x, y, p) in fg_pixels.enumerate_pixels_mut() {
            *p = Rgba([200, (x * 13) as u8, (y * 20) as u8, (x * 15) as u8]);
        }
        let fg = Raster::new(fg_pixels).unwrap();
        let t = Transform {
            x: 3.7,
            y: -5.2,
            scale: 1.35,
            rotation: 33.0,
            opacity: 0.8,
        };

        let first = render(&bg, Some(&fg), &t, Size::new(64, 48)).unwrap();
        let second = render(&bg, Some(&fg), &t, Size::new(64, 48)).unwrap();
        assert_eq!(first.pixels().as_raw(), second.pixels().as_raw());
    }

    #[test]
    fn test_empty_canvas_is_error() {
        let bg = solid(4, 4, BLUE);
        assert!(render(&bg, None, &Transform::IDENTITY, Size::new(0, 4)).is_err());
    }
}
