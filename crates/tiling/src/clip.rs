//! Export of the buffered raster and clip-back to the tile extent

use crate::interpolate::Surface;
use lidartile_algorithms::patch::{patch_nodata, PatchParams};
use lidartile_core::io::{read_geotiff, write_geotiff_atomic, GeoTiffOptions};
use lidartile_core::raster::{warp_nearest, Raster};
use lidartile_core::{BoundingBox, Error, Result, CRS};
use std::path::Path;
use tracing::{debug, info, warn};

/// Output settings for [`export_and_clip`]
#[derive(Debug, Clone)]
pub struct ClipOptions {
    pub pixel_size: f64,
    pub nodata: f64,
    /// Attached to the output when the buffered raster carries none
    pub crs: CRS,
    pub patch: Option<PatchParams>,
    pub geotiff: GeoTiffOptions,
}

/// Summary of the final raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipReport {
    pub rows: usize,
    pub cols: usize,
    pub nodata_cells: usize,
    /// Cells filled by the patch pass
    pub patched: usize,
}

/// Persist `surface` at `buffered_path` (unless the backend already did),
/// then warp it onto `tile_extent` and write `final_path`.
///
/// The buffered file is re-opened before clipping; if that fails nothing is
/// written at `final_path`. The final write goes through a temporary file so
/// a failure never leaves a partial raster behind.
pub fn export_and_clip(
    surface: &Surface,
    buffered_path: &Path,
    final_path: &Path,
    tile_extent: &BoundingBox,
    options: &ClipOptions,
) -> Result<ClipReport> {
    if let Surface::InMemory(raster) = surface {
        write_geotiff_atomic(raster, buffered_path, Some(options.geotiff.clone()))?;
        debug!("Wrote buffered raster {}", buffered_path.display());
    }

    let mut buffered: Raster<f64> = read_geotiff(buffered_path).map_err(|e| Error::RasterWrite {
        path: buffered_path.to_path_buf(),
        reason: format!("buffered raster cannot be opened: {e}"),
    })?;
    if buffered.nodata().is_none() {
        buffered.set_nodata(Some(options.nodata));
    }
    match buffered.crs() {
        None => buffered.set_crs(Some(options.crs.clone())),
        Some(crs) if !crs.is_equivalent(&options.crs) => warn!(
            "{} is in {}, expected {}; keeping it as is",
            buffered_path.display(),
            crs,
            options.crs
        ),
        Some(_) => {}
    }

    let mut clipped = warp_nearest(&buffered, tile_extent, options.pixel_size)?;
    let patched = match options.patch {
        Some(params) => patch_nodata(&mut clipped, params)?,
        None => 0,
    };

    write_geotiff_atomic(&clipped, final_path, Some(options.geotiff.clone()))?;

    let (rows, cols) = clipped.shape();
    let report = ClipReport {
        rows,
        cols,
        nodata_cells: clipped.nodata_count(),
        patched,
    };
    info!(
        "Clipped to {}: {}x{} pixels, {} no-data, {} patched -> {}",
        tile_extent,
        cols,
        rows,
        report.nodata_cells,
        patched,
        final_path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidartile_algorithms::interpolation::GridSpec;

    fn options() -> ClipOptions {
        ClipOptions {
            pixel_size: 1.0,
            nodata: -9999.0,
            crs: CRS::lambert93(),
            patch: None,
            geotiff: GeoTiffOptions::default(),
        }
    }

    /// 14x14 buffered raster around the tile [2, 12] x [2, 12]
    fn buffered_surface() -> Surface {
        let grid = GridSpec::covering(&BoundingBox::new(0.0, 14.0, 0.0, 14.0), 1.0, -9999.0).unwrap();
        let mut raster = grid.nodata_raster();
        for row in 0..14 {
            for col in 0..14 {
                let (x, y) = grid.sample(col, row);
                raster.set(row, col, x + 100.0 * y).unwrap();
            }
        }
        Surface::InMemory(raster)
    }

    #[test]
    fn test_clip_to_tile_extent() {
        let dir = tempfile::tempdir().unwrap();
        let buffered = dir.path().join("t_1M_TINlinear_buffer.tif");
        let output = dir.path().join("t_1M_TINlinear.tif");
        let extent = BoundingBox::new(2.0, 12.0, 2.0, 12.0);

        let report = export_and_clip(&buffered_surface(), &buffered, &output, &extent, &options()).unwrap();
        assert_eq!((report.rows, report.cols), (10, 10));
        assert_eq!(report.nodata_cells, 0);
        assert!(buffered.is_file());

        let out: Raster<f64> = read_geotiff(&output).unwrap();
        let b = out.bounds();
        assert_relative_eq!(b.min_x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(b.max_y, 12.0, epsilon = 1e-6);
        assert_eq!(out.crs().and_then(|c| c.epsg()), Some(2154));
        // upper-left pixel center (2.5, 11.5)
        assert_relative_eq!(out.get(0, 0).unwrap(), 2.5 + 1150.0, epsilon = 1e-3);
    }

    #[test]
    fn test_extent_beyond_buffer_is_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let buffered = dir.path().join("b.tif");
        let output = dir.path().join("o.tif");
        let extent = BoundingBox::new(10.0, 20.0, 0.0, 10.0);

        let report = export_and_clip(&buffered_surface(), &buffered, &output, &extent, &options()).unwrap();
        // columns 14..20 are outside the buffered raster
        assert_eq!(report.nodata_cells, 60);
    }

    #[test]
    fn test_patch_runs_on_clipped_raster() {
        let dir = tempfile::tempdir().unwrap();
        let (buffered, output) = (dir.path().join("b.tif"), dir.path().join("o.tif"));
        let Surface::InMemory(mut raster) = buffered_surface() else {
            unreachable!()
        };
        raster.set(7, 7, -9999.0).unwrap();
        let opts = ClipOptions {
            patch: Some(PatchParams { min_neighbors: 8 }),
            ..options()
        };
        let extent = BoundingBox::new(2.0, 12.0, 2.0, 12.0);
        let report = export_and_clip(&Surface::InMemory(raster), &buffered, &output, &extent, &opts).unwrap();
        assert_eq!(report.patched, 1);
        assert_eq!(report.nodata_cells, 0);
    }

    #[test]
    fn test_unreadable_buffered_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let buffered = dir.path().join("broken_buffer.tif");
        std::fs::write(&buffered, b"not a tiff").unwrap();
        let output = dir.path().join("final.tif");

        let err = export_and_clip(
            &Surface::FileProduced(buffered.clone()),
            &buffered,
            &output,
            &BoundingBox::new(0.0, 1.0, 0.0, 1.0),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::RasterWrite { .. }));
        assert!(!output.exists());
    }
}
