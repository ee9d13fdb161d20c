//! Nearest-neighbor resampling of a raster onto a target extent

use super::{GeoTransform, Raster, RasterElement};
use crate::error::{Error, Result};
use crate::geometry::BoundingBox;

/// Resample `src` onto the grid covering `target` at `pixel_size`.
///
/// Each output pixel takes the value of the source pixel containing its
/// center. Output pixels whose center falls outside the source are no-data.
/// Source metadata (CRS, no-data) is carried over.
pub fn warp_nearest<T: RasterElement>(
    src: &Raster<T>,
    target: &BoundingBox,
    pixel_size: f64,
) -> Result<Raster<T>> {
    if pixel_size <= 0.0 || !pixel_size.is_finite() {
        return Err(Error::InvalidParameter {
            name: "pixel_size",
            value: pixel_size.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    // Snap to whole pixels; target extents come from a pixel-aligned grid
    // so the rounding only absorbs floating point noise.
    let cols = (target.width() / pixel_size).round() as usize;
    let rows = (target.height() / pixel_size).round() as usize;
    if cols == 0 || rows == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let fill = src.nodata().unwrap_or_else(T::default_nodata);
    let transform = GeoTransform::from_bounds(target, pixel_size);
    let src_transform = src.transform();
    let (src_rows, src_cols) = src.shape();

    let mut out = Raster::filled(rows, cols, fill);
    out.set_transform(transform);
    out.set_crs(src.crs().cloned());
    out.set_nodata(Some(fill));

    let src_data = src.data();
    for ((row, col), cell) in out.data_mut().indexed_iter_mut() {
        let (x, y) = transform.pixel_to_geo(col, row);
        if let Some((sc, sr)) = src_transform.pixel_index(x, y, src_cols, src_rows) {
            let value = src_data[(sr, sc)];
            *cell = if value.is_nodata(src.nodata()) { fill } else { value };
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize, origin_x: f64, origin_y: f64) -> Raster<f64> {
        let data = (0..rows * cols).map(|i| i as f64).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(origin_x, origin_y, 1.0, -1.0));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn test_warp_subwindow_keeps_values() {
        let src = ramp(10, 10, 0.0, 10.0);
        let out = warp_nearest(&src, &BoundingBox::new(2.0, 5.0, 3.0, 7.0), 1.0).unwrap();
        assert_eq!(out.shape(), (4, 3));
        // upper-left output pixel center (2.5, 6.5) is source (col 2, row 3)
        assert_eq!(out.get(0, 0).unwrap(), 32.0);
        assert_eq!(out.bounds(), BoundingBox::new(2.0, 5.0, 3.0, 7.0));
    }

    #[test]
    fn test_warp_outside_source_is_nodata() {
        let src = ramp(4, 4, 0.0, 4.0);
        let out = warp_nearest(&src, &BoundingBox::new(2.0, 6.0, 0.0, 4.0), 1.0).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 2.0);
        assert_eq!(out.get(0, 3).unwrap(), -9999.0);
        assert_eq!(out.nodata_count(), 8);
    }

    #[test]
    fn test_warp_rejects_bad_pixel_size() {
        let src = ramp(2, 2, 0.0, 2.0);
        assert!(warp_nearest(&src, &BoundingBox::new(0.0, 2.0, 0.0, 2.0), 0.0).is_err());
    }
}
