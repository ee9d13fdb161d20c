//! Single-tile pipeline: neighbors, stitching, interpolation, clip-back

use crate::clip::{export_and_clip, ClipOptions, ClipReport};
use crate::config::PipelineConfig;
use crate::interpolate::{interpolate, NativeTarget, PdalBackend, RasterBackend};
use crate::neighbors::resolve;
use crate::paths::{TilePaths, WorkDirs};
use crate::stitch::stitch;
use crate::tile_name::TileId;
use lidartile_algorithms::interpolation::GridSpec;
use lidartile_core::io::{GeoTiffOptions, LasReader, PointSource};
use lidartile_core::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of a successful tile run
#[derive(Debug, Clone)]
pub struct TileOutcome {
    pub tile: TileId,
    pub final_raster: PathBuf,
    /// Points left after cropping to the buffered extent
    pub points: usize,
    pub neighbors: usize,
    pub report: ClipReport,
    pub elapsed: Duration,
}

/// Configured pipeline; safe to share between worker threads
pub struct Pipeline {
    pub config: PipelineConfig,
    pub dirs: WorkDirs,
    reader: Box<dyn PointSource>,
    backend: Box<dyn RasterBackend>,
}

impl Pipeline {
    /// Pipeline reading LAS/LAZ files and calling PDAL for native methods
    pub fn new(config: PipelineConfig, dirs: WorkDirs) -> Result<Self> {
        config.validate()?;
        let reader = LasReader::new(config.io.classes.clone(), Some(config.crs()?));
        let backend = PdalBackend::new(&config.interpolation.native.program);
        Ok(Self {
            config,
            dirs,
            reader: Box::new(reader),
            backend: Box::new(backend),
        })
    }

    pub fn with_reader(mut self, reader: impl PointSource + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_backend(mut self, backend: impl RasterBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// Process the tile whose file name is `tile_file` in the input directory.
    /// Only the file name component of `tile_file` is used.
    pub fn run_tile(&self, tile_file: &Path) -> Result<TileOutcome> {
        let start = Instant::now();
        let tile = TileId::parse(tile_file)?;
        let config = &self.config;
        let geometry = &config.tile_geometry;
        let method = config.interpolation.method;
        let crs = config.crs()?;
        let paths = TilePaths::new(&tile, &self.dirs, method, geometry.pixel_size);
        info!("{}: {} at {} m", tile.stem(), method, geometry.pixel_size);

        fs::create_dir_all(&self.dirs.scratch)?;
        fs::create_dir_all(&self.dirs.output)?;

        let neighbors = resolve(&tile.neighbors(), &self.dirs.input);
        if neighbors.is_empty() {
            info!("{}: no neighbors found, processing in isolation", tile.stem());
        }
        let stitched = stitch(&paths.input, &neighbors, config.buffer_width, self.reader.as_ref())?;
        let points = stitched.len();

        let extent = tile.raster_extent(geometry.tile_coord_scale, geometry.tile_width, geometry.pixel_size);
        let grid = GridSpec::covering(
            &extent.buffered(config.buffer_width),
            geometry.pixel_size,
            geometry.no_data_value,
        )?;
        debug!("{}: buffered grid {}x{} at {}", tile.stem(), grid.cols, grid.rows, grid.bounds());

        let surface = interpolate(
            &stitched.cloud,
            &grid,
            &config.interpolation,
            &crs,
            NativeTarget {
                backend: self.backend.as_ref(),
                cloud_path: &paths.buffered_cloud,
                raster_path: &paths.buffered_raster,
            },
        )?;
        drop(stitched);

        let options = ClipOptions {
            pixel_size: geometry.pixel_size,
            nodata: geometry.no_data_value,
            crs,
            patch: config.patch,
            geotiff: GeoTiffOptions {
                double_precision: config.io.double_precision,
            },
        };
        let report = export_and_clip(
            &surface,
            &paths.buffered_raster,
            &paths.final_raster,
            &extent,
            &options,
        )?;

        let elapsed = start.elapsed();
        info!("{}: done in {:.2?}", tile.stem(), elapsed);
        debug!("{}: pid {}", tile.stem(), std::process::id());
        Ok(TileOutcome {
            tile,
            final_raster: paths.final_raster,
            points,
            neighbors: neighbors.len(),
            report,
            elapsed,
        })
    }
}

/// Run one tile with the default LAS reader and PDAL backend
pub fn run_tile(tile_file: &Path, dirs: &WorkDirs, config: &PipelineConfig) -> Result<TileOutcome> {
    Pipeline::new(config.clone(), dirs.clone())?.run_tile(tile_file)
}
