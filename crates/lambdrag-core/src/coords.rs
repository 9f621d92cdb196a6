//! Coordinate model: normalized token positions, independent of the
//! canvas pixel size.

use serde::{Deserialize, Serialize};

/// Width-to-height ratio the canvas is always kept at.
pub const CANVAS_ASPECT: u32 = 2;

/// A position in normalized `[0, 1]²` canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Screen-space bounding box of the canvas, as a pointer sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasBox {
    /// Map a page-space pointer position into normalized space.
    ///
    /// No clamping: a pointer just outside the box yields a value just
    /// outside `[0, 1]`. Returns `None` for a degenerate box.
    pub fn normalize(&self, page_x: f64, page_y: f64) -> Option<Point> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(Point::new(
            (page_x - self.left) / self.width,
            (page_y - self.top) / self.height,
        ))
    }
}

/// Logical pixel surface tokens are drawn on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    width_px: u32,
    height_px: u32,
    left: f64,
    top: f64,
}

impl Canvas {
    pub fn with_height(height_px: u32) -> Self {
        Self {
            width_px: height_px.saturating_mul(CANVAS_ASPECT),
            height_px,
            left: 0.0,
            top: 0.0,
        }
    }

    /// Recompute pixel dimensions for a new height; width follows the
    /// fixed aspect ratio.
    pub fn resize(&mut self, height_px: u32) {
        self.height_px = height_px;
        self.width_px = height_px.saturating_mul(CANVAS_ASPECT);
    }

    /// Move the canvas origin within the page.
    pub fn set_offset(&mut self, left: f64, top: f64) {
        self.left = left;
        self.top = top;
    }

    pub fn width(&self) -> u32 {
        self.width_px
    }

    pub fn height(&self) -> u32 {
        self.height_px
    }

    pub fn bounding_box(&self) -> CanvasBox {
        CanvasBox {
            left: self.left,
            top: self.top,
            width: f64::from(self.width_px),
            height: f64::from(self.height_px),
        }
    }

    /// Normalized position to canvas-local pixels.
    pub fn to_pixels(&self, p: Point) -> (f64, f64) {
        (p.x * f64::from(self.width_px), p.y * f64::from(self.height_px))
    }
}
