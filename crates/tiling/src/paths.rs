//! Names of the intermediate and final files of a tile
//!
//! Every name is derived from the tile stem, so concurrent workers sharing
//! the scratch directory never write the same file.

use crate::method::InterpolationMethod;
use crate::tile_name::TileId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories used by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDirs {
    /// Tile and neighbor point clouds
    pub input: PathBuf,
    /// Buffered clouds and rasters
    pub scratch: PathBuf,
    /// Final clipped rasters
    pub output: PathBuf,
}

impl WorkDirs {
    pub fn new(input: impl Into<PathBuf>, scratch: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            scratch: scratch.into(),
            output: output.into(),
        }
    }
}

/// File layout for one tile and method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePaths {
    pub input: PathBuf,
    /// `{scratch}/{stem}_buffer.las`
    pub buffered_cloud: PathBuf,
    /// `{scratch}/{stem}{res}_{tag}_buffer.tif`
    pub buffered_raster: PathBuf,
    /// `{output}/{stem}{res}_{tag}.tif`
    pub final_raster: PathBuf,
}

impl TilePaths {
    pub fn new(tile: &TileId, dirs: &WorkDirs, method: InterpolationMethod, pixel_size: f64) -> Self {
        let stem = tile.stem();
        let raster_stem = format!("{stem}{}_{}", resolution_tag(pixel_size), method.file_tag());
        Self {
            input: dirs.input.join(tile.file_name()),
            buffered_cloud: dirs.scratch.join(format!("{stem}_buffer.las")),
            buffered_raster: dirs.scratch.join(format!("{raster_stem}_buffer.tif")),
            final_raster: dirs.output.join(format!("{raster_stem}.tif")),
        }
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.buffered_raster.parent()
    }
}

/// `_1M` for whole meters, `_50CM` otherwise
pub fn resolution_tag(pixel_size: f64) -> String {
    if pixel_size >= 1.0 && pixel_size.fract() == 0.0 {
        format!("_{}M", pixel_size as u64)
    } else {
        format!("_{}CM", (pixel_size * 100.0).round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tag() {
        assert_eq!(resolution_tag(1.0), "_1M");
        assert_eq!(resolution_tag(5.0), "_5M");
        assert_eq!(resolution_tag(0.5), "_50CM");
        assert_eq!(resolution_tag(0.25), "_25CM");
        assert_eq!(resolution_tag(2.5), "_250CM");
    }

    #[test]
    fn test_tile_paths() {
        let tile = TileId::parse("Semis_2021_0770_6278_LA93_IGN69.laz").unwrap();
        let dirs = WorkDirs::new("/in", "/tmp/work", "/out");
        let p = TilePaths::new(&tile, &dirs, InterpolationMethod::NaturalNeighbor, 0.5);
        assert_eq!(p.input, PathBuf::from("/in/Semis_2021_0770_6278_LA93_IGN69.laz"));
        assert_eq!(p.buffered_cloud, PathBuf::from("/tmp/work/Semis_2021_0770_6278_LA93_IGN69_buffer.las"));
        assert_eq!(
            p.buffered_raster,
            PathBuf::from("/tmp/work/Semis_2021_0770_6278_LA93_IGN69_50CM_NN_buffer.tif")
        );
        assert_eq!(p.final_raster, PathBuf::from("/out/Semis_2021_0770_6278_LA93_IGN69_50CM_NN.tif"));
        assert_eq!(p.scratch_dir(), Some(Path::new("/tmp/work")));
    }

    #[test]
    fn test_names_differ_per_tile_and_method() {
        let dirs = WorkDirs::new("in", "tmp", "out");
        let a = TileId::parse("Semis_2021_0770_6278_LA93_IGN69.laz").unwrap();
        let b = TileId::parse("Semis_2021_0771_6278_LA93_IGN69.laz").unwrap();
        let pa = TilePaths::new(&a, &dirs, InterpolationMethod::TinLinear, 1.0);
        let pb = TilePaths::new(&b, &dirs, InterpolationMethod::TinLinear, 1.0);
        let pc = TilePaths::new(&a, &dirs, InterpolationMethod::Laplace, 1.0);
        assert_ne!(pa.buffered_cloud, pb.buffered_cloud);
        assert_ne!(pa.buffered_raster, pc.buffered_raster);
        assert_ne!(pa.final_raster, pc.final_raster);
    }
}
