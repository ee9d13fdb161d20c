//! Missing-value patch
//!
//! Fills isolated no-data cells with the median of their valid 3x3
//! neighbors. Every decision reads the raster as it was before the pass,
//! so the output does not depend on traversal order.

use crate::maybe_rayon::*;
use lidartile_core::raster::{Neighborhood, Raster};
use lidartile_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters for [`patch_nodata`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchParams {
    /// Valid 8-neighbors a no-data cell needs before it is filled (1..=8)
    pub min_neighbors: usize,
}

impl PatchParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_neighbors == 0 || self.min_neighbors > 8 {
            return Err(Error::InvalidParameter {
                name: "min_neighbors",
                value: self.min_neighbors.to_string(),
                reason: "must be between 1 and 8".into(),
            });
        }
        Ok(())
    }
}

impl Default for PatchParams {
    fn default() -> Self {
        Self { min_neighbors: 5 }
    }
}

/// Fill no-data cells that have at least `min_neighbors` valid neighbors.
///
/// Returns the number of cells filled. With an even number of valid
/// neighbors the median is the mean of the two middle values.
pub fn patch_nodata(raster: &mut Raster<f64>, params: PatchParams) -> Result<usize> {
    params.validate()?;

    let (rows, cols) = raster.shape();
    let snapshot = raster.data();

    let fills: Vec<(usize, usize, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut values = Vec::with_capacity(8);
            let mut row_fills = Vec::new();
            for col in 0..cols {
                if !raster.is_nodata(snapshot[(row, col)]) {
                    continue;
                }
                values.clear();
                values.extend(
                    Neighborhood::Queen3x3
                        .cells_around(row, col, rows, cols)
                        .map(|(r, c)| snapshot[(r, c)])
                        .filter(|v| !raster.is_nodata(*v)),
                );
                if values.len() >= params.min_neighbors {
                    row_fills.push((row, col, median(&mut values)));
                }
            }
            row_fills
        })
        .collect();

    let data = raster.data_mut();
    for &(row, col, value) in &fills {
        data[(row, col)] = value;
    }
    tracing::debug!("Patched {} no-data cells", fills.len());
    Ok(fills.len())
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ND: f64 = -9999.0;

    fn raster(data: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_nodata(Some(ND));
        r
    }

    #[test]
    fn test_single_hole_gets_median() {
        #[rustfmt::skip]
        let mut r = raster(vec![
            1.0, 2.0, 3.0,
            4.0, ND,  6.0,
            7.0, 8.0, 100.0,
        ], 3, 3);
        let filled = patch_nodata(&mut r, PatchParams { min_neighbors: 8 }).unwrap();
        assert_eq!(filled, 1);
        // sorted 1 2 3 4 6 7 8 100: mean of 4 and 6
        assert_eq!(r.get(1, 1).unwrap(), 5.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // corner hole sees 3 valid neighbors
        #[rustfmt::skip]
        let data = vec![
            ND,  2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];
        let mut r = raster(data.clone(), 3, 3);
        assert_eq!(patch_nodata(&mut r, PatchParams { min_neighbors: 3 }).unwrap(), 1);
        assert_eq!(r.get(0, 0).unwrap(), 4.0);

        let mut r = raster(data, 3, 3);
        assert_eq!(patch_nodata(&mut r, PatchParams { min_neighbors: 4 }).unwrap(), 0);
        assert_eq!(r.get(0, 0).unwrap(), ND);
    }

    #[test]
    fn test_uses_snapshot_not_filled_values() {
        // two adjacent holes: each sees the other as missing
        #[rustfmt::skip]
        let mut r = raster(vec![
            1.0, 1.0, 1.0, 1.0,
            1.0, ND,  ND,  1.0,
            1.0, 1.0, 1.0, 1.0,
        ], 3, 4);
        let filled = patch_nodata(&mut r, PatchParams { min_neighbors: 8 }).unwrap();
        assert_eq!(filled, 0);

        let filled = patch_nodata(&mut r, PatchParams { min_neighbors: 7 }).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(r.nodata_count(), 0);
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let mut r = raster(vec![f64::NAN, 2.0, 2.0, 2.0], 2, 2);
        assert_eq!(patch_nodata(&mut r, PatchParams { min_neighbors: 3 }).unwrap(), 1);
        assert_eq!(r.get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_invalid_threshold() {
        let mut r = raster(vec![1.0; 4], 2, 2);
        assert!(patch_nodata(&mut r, PatchParams { min_neighbors: 0 }).is_err());
        assert!(patch_nodata(&mut r, PatchParams { min_neighbors: 9 }).is_err());
    }
}
