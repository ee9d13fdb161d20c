//! Deterministic surface interpolation
//!
//! Reconstruct a height grid from scattered ground points:
//! - TIN linear: plane of the enclosing Delaunay triangle
//! - Laplace: non-Sibsonian natural neighbor weights
//! - Natural neighbor: Sibson area-stealing weights
//! - Quadrant IDW: inverse distance weighting with a growing search
//!   window that must reach every quadrant around the sample
//!
//! Every method fills a [`GridSpec`]: each cell receives a finite height or
//! exactly the grid's no-data value.

mod delaunay;
mod idw_quad;
pub mod kdtree;
mod natural_neighbor;
mod tin;

pub use delaunay::Triangulation;
pub use idw_quad::{idw_quad, IdwQuadParams, SearchMode};
pub use kdtree::{KdTree, NearestResult};
pub use natural_neighbor::{laplace, natural_neighbor};
pub use tin::tin_linear;

use crate::maybe_rayon::*;
use lidartile_core::raster::{GeoTransform, Raster, RasterElement};
use lidartile_core::{BoundingBox, Error, Result};
use serde::{Deserialize, Serialize};

/// Shape and placement of an output grid.
///
/// `origin_x`/`origin_y` is the *center* of the upper-left pixel; sample
/// (col, row) sits at `(origin_x + col * pixel_size, origin_y - row * pixel_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: usize,
    pub rows: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub nodata: f64,
}

impl GridSpec {
    pub fn new(
        cols: usize,
        rows: usize,
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
        nodata: f64,
    ) -> Self {
        Self {
            cols,
            rows,
            origin_x,
            origin_y,
            pixel_size,
            nodata,
        }
    }

    /// Grid whose pixels tile `bbox` from its upper-left corner:
    /// `cols = ceil(width / pixel_size)`, `rows = ceil(height / pixel_size)`.
    pub fn covering(bbox: &BoundingBox, pixel_size: f64, nodata: f64) -> Result<Self> {
        validate_pixel_size(pixel_size)?;
        // Tolerate floating point noise on exact multiples of the pixel size
        let count = |len: f64| ((len / pixel_size) - 1e-9).ceil().max(0.0) as usize;
        let grid = Self::new(
            count(bbox.width()),
            count(bbox.height()),
            bbox.min_x + pixel_size / 2.0,
            bbox.max_y - pixel_size / 2.0,
            pixel_size,
            nodata,
        );
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<()> {
        validate_pixel_size(self.pixel_size)?;
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::InvalidDimensions {
                width: self.cols,
                height: self.rows,
            });
        }
        if !self.origin_x.is_finite() || !self.origin_y.is_finite() {
            return Err(Error::InvalidParameter {
                name: "origin",
                value: format!("({}, {})", self.origin_x, self.origin_y),
                reason: "grid origin must be finite".into(),
            });
        }
        Ok(())
    }

    /// Map position of sample (col, row)
    #[inline]
    pub fn sample(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + col as f64 * self.pixel_size,
            self.origin_y - row as f64 * self.pixel_size,
        )
    }

    /// North-up transform anchored on the outer corner of the upper-left pixel
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::new(
            self.origin_x - self.pixel_size / 2.0,
            self.origin_y + self.pixel_size / 2.0,
            self.pixel_size,
            -self.pixel_size,
        )
    }

    /// Extent covered by the grid's pixels
    pub fn bounds(&self) -> BoundingBox {
        self.transform().bounds(self.cols, self.rows)
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Georeferenced raster with every cell set to no-data
    pub fn nodata_raster(&self) -> Raster<f64> {
        let mut raster = Raster::filled(self.rows, self.cols, self.nodata);
        raster.set_transform(self.transform());
        raster.set_nodata(Some(self.nodata));
        raster
    }

    /// Evaluate `f` at every sample position, row by row.
    ///
    /// `init` builds per-row scratch state (search hints, buffers) handed
    /// to every call in that row. Non-finite results become no-data.
    pub(crate) fn fill<S, I, F>(&self, init: I, f: F) -> Result<Raster<f64>>
    where
        I: Fn() -> S + Sync + Send,
        F: Fn(&mut S, f64, f64) -> f64 + Sync + Send,
    {
        self.validate()?;
        let (rows, cols, nodata) = (self.rows, self.cols, self.nodata);

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut state = init();
                let mut row_data = vec![nodata; cols];
                for (col, cell) in row_data.iter_mut().enumerate() {
                    let (x, y) = self.sample(col, row);
                    *cell = f(&mut state, x, y).finite_or(nodata);
                }
                row_data
            })
            .collect();

        let mut output = Raster::from_vec(data, rows, cols)?;
        output.set_transform(self.transform());
        output.set_nodata(Some(nodata));
        Ok(output)
    }
}

fn validate_pixel_size(pixel_size: f64) -> Result<()> {
    if pixel_size <= 0.0 || !pixel_size.is_finite() {
        return Err(Error::InvalidParameter {
            name: "pixel_size",
            value: pixel_size.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_covering_counts_pixels() {
        let bbox = BoundingBox::new(0.0, 10.0, 0.0, 5.0);
        let grid = GridSpec::covering(&bbox, 1.0, -9999.0).unwrap();
        assert_eq!((grid.cols, grid.rows), (10, 5));

        let grid = GridSpec::covering(&bbox, 3.0, -9999.0).unwrap();
        assert_eq!((grid.cols, grid.rows), (4, 2));
    }

    #[test]
    fn test_sample_positions_are_pixel_centers() {
        let grid = GridSpec::covering(&BoundingBox::new(100.0, 110.0, 50.0, 60.0), 0.5, -9999.0).unwrap();
        let (x, y) = grid.sample(0, 0);
        assert_relative_eq!(x, 100.25);
        assert_relative_eq!(y, 59.75);

        let (cx, cy) = grid.transform().pixel_to_geo(3, 7);
        let (sx, sy) = grid.sample(3, 7);
        assert_relative_eq!(cx, sx, epsilon = 1e-9);
        assert_relative_eq!(cy, sy, epsilon = 1e-9);
        assert_eq!(grid.bounds(), BoundingBox::new(100.0, 110.0, 50.0, 60.0));
    }

    #[test]
    fn test_invalid_pixel_size() {
        let bbox = BoundingBox::new(0.0, 1.0, 0.0, 1.0);
        assert!(matches!(
            GridSpec::covering(&bbox, 0.0, -9999.0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(GridSpec::covering(&bbox, -2.0, -9999.0).is_err());
    }

    #[test]
    fn test_fill_replaces_non_finite() {
        let grid = GridSpec::new(3, 2, 0.5, 1.5, 1.0, -9999.0);
        let raster = grid
            .fill(|| (), |_, x, _| if x > 1.0 { f64::NAN } else { x })
            .unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), 0.5);
        assert_eq!(raster.get(1, 2).unwrap(), -9999.0);
        assert_eq!(raster.nodata(), Some(-9999.0));
    }
}
