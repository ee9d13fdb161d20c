//! Height difference between two co-registered rasters
//!
//! Used to derive a height model above ground (DHM = DSM - DTM).

use crate::maybe_rayon::*;
use lidartile_core::raster::Raster;
use lidartile_core::{Error, Result};

/// `minuend - subtrahend` cell by cell.
///
/// Both rasters must have the same shape. A cell that is no-data in either
/// input is no-data in the output, which carries the minuend's transform,
/// CRS and no-data value (or the default sentinel when it has none).
pub fn difference(minuend: &Raster<f64>, subtrahend: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = minuend.shape();
    if subtrahend.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: subtrahend.rows(),
            ac: subtrahend.cols(),
        });
    }

    let nodata = minuend.nodata().unwrap_or(-9999.0);
    let a = minuend.data();
    let b = subtrahend.data();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let (va, vb) = (a[(row, col)], b[(row, col)]);
                    if minuend.is_nodata(va) || subtrahend.is_nodata(vb) {
                        nodata
                    } else {
                        va - vb
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = Raster::from_vec(data, rows, cols)?;
    output.set_transform(*minuend.transform());
    output.set_crs(minuend.crs().cloned());
    output.set_nodata(Some(nodata));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidartile_core::raster::GeoTransform;

    fn raster(data: Vec<f64>, nodata: f64) -> Raster<f64> {
        let mut r = Raster::from_vec(data, 2, 2).unwrap();
        r.set_nodata(Some(nodata));
        r.set_transform(GeoTransform::new(100.0, 200.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_difference_subtracts() {
        let dsm = raster(vec![110.0, 112.5, 120.0, 101.0], -9999.0);
        let dtm = raster(vec![100.0, 100.0, 100.0, 101.0], -9999.0);
        let dhm = difference(&dsm, &dtm).unwrap();
        assert_eq!(dhm.get(0, 1).unwrap(), 12.5);
        assert_eq!(dhm.get(1, 1).unwrap(), 0.0);
        assert_eq!(dhm.transform().origin_x, 100.0);
    }

    #[test]
    fn test_nodata_propagates_from_both_sides() {
        // the subtrahend uses a different sentinel
        let dsm = raster(vec![-9999.0, 5.0, 5.0, 5.0], -9999.0);
        let dtm = raster(vec![1.0, -1.0, f64::NAN, 1.0], -1.0);
        let dhm = difference(&dsm, &dtm).unwrap();
        assert_eq!(dhm.get(0, 0).unwrap(), -9999.0);
        assert_eq!(dhm.get(0, 1).unwrap(), -9999.0);
        assert_eq!(dhm.get(1, 0).unwrap(), -9999.0);
        assert_eq!(dhm.get(1, 1).unwrap(), 4.0);
        assert_eq!(dhm.nodata_count(), 3);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = raster(vec![1.0; 4], -9999.0);
        let b = Raster::from_vec(vec![1.0; 6], 2, 3).unwrap();
        assert!(matches!(difference(&a, &b), Err(Error::SizeMismatch { ac: 3, .. })));
    }
}
