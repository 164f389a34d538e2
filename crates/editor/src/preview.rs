//! Interactive preview surface.
//!
//! The surface keeps a display-sized copy of the background and re-renders
//! through the compositor whenever the transform or a layer changes.
//! Pointer positions are in display canvas pixels. Zoom only magnifies the
//! presentation: it never reaches the transform or exported pixels.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use matte_common::config::PreviewConfig;
use matte_common::error::{MatteError, MatteResult};
use matte_model::geometry::{DisplayBounds, DisplayGeometry, Size};
use matte_model::transform::{Transform, TransformPatch};
use matte_render_engine::{compositor, Raster};

/// A pointer position on the display canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Presentation magnification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    level: f64,
    min: f64,
    max: f64,
    step: f64,
}

impl Zoom {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self {
            level: 1.0_f64.clamp(min, max),
            min,
            max,
            step,
        }
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        Self::new(config.min_zoom, config.max_zoom, config.zoom_step)
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn percent(&self) -> u32 {
        (self.level * 100.0).round() as u32
    }

    pub fn can_zoom_in(&self) -> bool {
        self.level < self.max
    }

    pub fn can_zoom_out(&self) -> bool {
        self.level > self.min
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.level = (self.level * self.step).min(self.max);
        self.level
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.level = (self.level / self.step).max(self.min);
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 1.0_f64.clamp(self.min, self.max);
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default())
    }
}

/// The status badges under the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanvasStatus {
    pub canvas: Option<Size>,
    pub position: (i64, i64),
    pub zoom_percent: u32,
}

impl fmt::Display for CanvasStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canvas {
            Some(size) => write!(f, "Canvas: {} × {}", size.width, size.height)?,
            None => f.write_str("Canvas: none")?,
        }
        write!(
            f,
            " | Position: {}, {} | Zoom: {}%",
            self.position.0, self.position.1, self.zoom_percent
        )
    }
}

#[derive(Debug)]
struct DisplayBackground {
    native: Arc<Raster>,
    display: Raster,
    geometry: DisplayGeometry,
}

#[derive(Debug)]
pub struct PreviewSurface {
    bounds: DisplayBounds,
    zoom: Zoom,
    transform: watch::Receiver<Transform>,
    background: Option<DisplayBackground>,
    foreground: Option<Arc<Raster>>,
    drag_anchor: Option<Point>,
    frame: Option<Raster>,
    dirty: bool,
    frames_rendered: u64,
}

impl PreviewSurface {
    pub fn new(transform: watch::Receiver<Transform>, bounds: DisplayBounds, zoom: Zoom) -> Self {
        Self {
            bounds,
            zoom,
            transform,
            background: None,
            foreground: None,
            drag_anchor: None,
            frame: None,
            dirty: true,
            frames_rendered: 0,
        }
    }

    /// Install the background. A display-sized copy is built up front; on
    /// failure the previous background stays.
    pub fn set_background(&mut self, native: Arc<Raster>) -> MatteResult<()> {
        let geometry = DisplayGeometry::fit(native.size(), self.bounds)
            .map_err(|e| MatteError::render(e.to_string()))?;
        let display = native.stretched(geometry.canvas_size())?;
        let canvas_size = display.size();
        tracing::debug!(
            native = %native.size(),
            canvas = %canvas_size,
            "preview background prepared"
        );
        self.background = Some(DisplayBackground {
            native,
            display,
            geometry,
        });
        self.dirty = true;
        Ok(())
    }

    /// Remove the background.
    pub fn clear_background(&mut self) {
        self.background = None;
        self.dirty = true;
    }

    /// Install or remove the foreground. Removing it ends any drag.
    pub fn set_foreground(&mut self, foreground: Option<Arc<Raster>>) {
        if foreground.is_none() {
            self.drag_anchor = None;
        }
        self.foreground = foreground;
        self.dirty = true;
    }

    pub fn geometry(&self) -> Option<DisplayGeometry> {
        self.background.as_ref().map(|bg| bg.geometry)
    }

    pub fn canvas_size(&self) -> Option<Size> {
        self.background.as_ref().map(|bg| bg.display.size())
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    /// Start dragging. Ignored when there is no foreground to drag.
    pub fn pointer_down(&mut self, pointer: Point) -> bool {
        if self.foreground.is_none() {
            return false;
        }
        let t = *self.transform.borrow();
        self.drag_anchor = Some(Point::new(pointer.x - t.x, pointer.y - t.y));
        true
    }

    /// The position update for a pointer move, if a drag is in progress.
    pub fn pointer_move(&self, pointer: Point) -> Option<TransformPatch> {
        let anchor = self.drag_anchor?;
        Some(TransformPatch::position(
            pointer.x - anchor.x,
            pointer.y - anchor.y,
        ))
    }

    pub fn pointer_up(&mut self) {
        self.drag_anchor = None;
    }

    pub fn pointer_leave(&mut self) {
        self.drag_anchor = None;
    }

    pub fn zoom(&self) -> &Zoom {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut Zoom {
        &mut self.zoom
    }

    /// Whether the next [`frame`](Self::frame) call has to render.
    pub fn needs_render(&self) -> bool {
        self.background.is_some()
            && (self.dirty
                || self.frame.is_none()
                || self.transform.has_changed().unwrap_or(false))
    }

    /// The current preview, rendering first if anything changed since the
    /// last frame. `None` until a background is loaded.
    pub fn frame(&mut self) -> MatteResult<Option<&Raster>> {
        let Some(background) = &self.background else {
            self.frame = None;
            return Ok(None);
        };

        let changed = self.transform.has_changed().unwrap_or(false);
        if self.dirty || changed || self.frame.is_none() {
            let transform = *self.transform.borrow_and_update();
            let frame = compositor::render_onto(
                &background.display,
                background.native.size(),
                self.foreground.as_deref(),
                &transform,
            )?;
            self.frame = Some(frame);
            self.dirty = false;
            self.frames_rendered += 1;
            tracing::debug!(frames = self.frames_rendered, ?transform, "preview rendered");
        }

        Ok(self.frame.as_ref())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn status(&self) -> CanvasStatus {
        CanvasStatus {
            canvas: self.canvas_size(),
            position: self.transform.borrow().rounded_position(),
            zoom_percent: self.zoom.percent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransformModel;
    use image::Rgba;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn solid(w: u32, h: u32, color: Rgba<u8>) -> Arc<Raster> {
        Arc::new(Raster::filled(Size::new(w, h), color).unwrap())
    }

    fn surface(model: &TransformModel) -> PreviewSurface {
        PreviewSurface::new(model.subscribe(), DisplayBounds::DEFAULT, Zoom::default())
    }

    #[test]
    fn test_zoom_steps_and_bounds() {
        let mut zoom = Zoom::default();
        assert_eq!(zoom.percent(), 100);
        assert_eq!(zoom.zoom_in(), 1.2);
        for _ in 0..20 {
            zoom.zoom_in();
        }
        assert_eq!(zoom.level(), 3.0);
        assert!(!zoom.can_zoom_in());
        for _ in 0..20 {
            zoom.zoom_out();
        }
        assert_eq!(zoom.level(), 0.5);
        assert_eq!(zoom.percent(), 50);
        zoom.reset();
        assert_eq!(zoom.level(), 1.0);
    }

    #[test]
    fn test_no_frame_without_background() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        assert!(preview.frame().unwrap().is_none());
        assert!(!preview.needs_render());
        assert_eq!(preview.status().to_string(), "Canvas: none | Position: 0, 0 | Zoom: 100%");
    }

    #[test]
    fn test_background_is_fitted_to_display() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_background(solid(1600, 1200, BLUE)).unwrap();
        let frame = preview.frame().unwrap().unwrap();
        assert_eq!(frame.size(), Size::new(800, 600));
        assert_eq!(
            preview.status().to_string(),
            "Canvas: 800 × 600 | Position: 0, 0 | Zoom: 100%"
        );
    }

    #[test]
    fn test_clearing_background_drops_frame() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_background(solid(100, 100, BLUE)).unwrap();
        assert!(preview.frame().unwrap().is_some());

        preview.clear_background();
        assert!(preview.geometry().is_none());
        assert!(preview.frame().unwrap().is_none());
        assert!(preview.status().canvas.is_none());
    }

    #[test]
    fn test_pointer_down_without_foreground_is_noop() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_background(solid(100, 100, BLUE)).unwrap();
        assert!(!preview.pointer_down(Point::new(10.0, 10.0)));
        assert!(!preview.is_dragging());
        assert!(preview.pointer_move(Point::new(20.0, 20.0)).is_none());
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let model = TransformModel::new();
        model.update(&TransformPatch::position(10.0, 5.0));
        let mut preview = surface(&model);
        preview.set_foreground(Some(solid(4, 4, RED)));

        assert!(preview.pointer_down(Point::new(50.0, 40.0)));
        let patch = preview.pointer_move(Point::new(60.0, 35.0)).unwrap();
        assert_eq!(patch, TransformPatch::position(20.0, 0.0));

        preview.pointer_leave();
        assert!(!preview.is_dragging());
        assert!(preview.pointer_move(Point::new(70.0, 70.0)).is_none());
    }

    #[test]
    fn test_clearing_foreground_ends_drag() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_foreground(Some(solid(4, 4, RED)));
        preview.pointer_down(Point::new(1.0, 1.0));
        preview.set_foreground(None);
        assert!(!preview.is_dragging());
    }

    #[test]
    fn test_rerenders_only_on_change() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_background(solid(40, 40, BLUE)).unwrap();
        preview.set_foreground(Some(solid(10, 10, RED)));

        assert_eq!(preview.frame().unwrap().unwrap().pixel(20, 20), RED);
        assert_eq!(preview.frames_rendered(), 1);
        preview.frame().unwrap();
        assert_eq!(preview.frames_rendered(), 1);

        model.update(&TransformPatch::position(-15.0, 0.0));
        assert!(preview.needs_render());
        let frame = preview.frame().unwrap().unwrap();
        assert_eq!(frame.pixel(20, 20), BLUE);
        assert_eq!(frame.pixel(6, 20), RED);
        assert_eq!(preview.frames_rendered(), 2);

        preview.set_foreground(None);
        assert_eq!(preview.frame().unwrap().unwrap().pixel(6, 20), BLUE);
        assert_eq!(preview.frames_rendered(), 3);
    }

    #[test]
    fn test_zoom_does_not_rerender() {
        let model = TransformModel::new();
        let mut preview = surface(&model);
        preview.set_background(solid(40, 40, BLUE)).unwrap();
        let before = preview.frame().unwrap().unwrap().clone();

        preview.zoom_mut().zoom_in();
        assert!(!preview.needs_render());
        assert_eq!(preview.frame().unwrap().unwrap(), &before);
        assert_eq!(preview.status().zoom_percent, 120);
        assert_eq!(model.current(), Transform::IDENTITY);
    }
}
