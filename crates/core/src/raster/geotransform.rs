//! Affine geotransformation for rasters

use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// North-up affine transform for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `origin` is the outer corner of the upper-left pixel and `pixel_height`
/// is negative, so row 0 is the northernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, negative for north-up)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// North-up transform whose upper-left corner is the top-left of `bbox`
    pub fn from_bounds(bbox: &BoundingBox, pixel_size: f64) -> Self {
        Self::new(bbox.min_x, bbox.max_y, pixel_size, -pixel_size)
    }

    /// Convert pixel coordinates to map coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row);
    /// use `.floor()` to get integer indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width.abs() < 1e-12 || self.pixel_height.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let col = (x - self.origin_x) / self.pixel_width;
        let row = (y - self.origin_y) / self.pixel_height;
        (col, row)
    }

    /// Integer pixel containing (x, y), if it falls inside a `cols` x `rows` grid
    pub fn pixel_index(&self, x: f64, y: f64, cols: usize, rows: usize) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        (col < cols && row < rows).then_some((col, row))
    }

    /// Get the cell size (assumes square pixels)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    pub fn is_north_up(&self) -> bool {
        self.pixel_width > 0.0 && self.pixel_height < 0.0
    }

    /// Extent covered by a raster of `cols` x `rows` pixels
    pub fn bounds(&self, cols: usize, rows: usize) -> BoundingBox {
        let x0 = self.origin_x;
        let x1 = self.origin_x + cols as f64 * self.pixel_width;
        let y0 = self.origin_y;
        let y1 = self.origin_y + rows as f64 * self.pixel_height;
        BoundingBox::new(x0.min(x1), x0.max(x1), y0.min(y1), y0.max(y1))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
