//! # lidartile tiling
//!
//! Per-tile DTM production from a directory of LIDAR tiles named after the
//! national grid (`Semis_2021_0770_6278_LA93_IGN69.laz`).
//!
//! For each tile the pipeline
//! 1. decodes the tile name and derives its eight neighbors,
//! 2. keeps the neighbors present on disk,
//! 3. merges their points and crops them to the tile extent plus a buffer,
//! 4. interpolates the buffered cloud onto a regular grid,
//! 5. clips the buffered raster back to the exact tile extent.
//!
//! Because every tile sees the points of its neighbors, the clipped rasters
//! line up without edge artifacts. Tiles are independent and a batch runs
//! them on a bounded worker pool.
//!
//! ```no_run
//! use lidartile_tiling::{run_tile, PipelineConfig, WorkDirs};
//! use std::path::Path;
//!
//! let dirs = WorkDirs::new("tiles", "/tmp/lidartile", "dtm");
//! let outcome = run_tile(
//!     Path::new("Semis_2021_0770_6278_LA93_IGN69.laz"),
//!     &dirs,
//!     &PipelineConfig::default(),
//! )?;
//! println!("{}", outcome.final_raster.display());
//! # Ok::<(), lidartile_core::Error>(())
//! ```

pub mod batch;
pub mod clip;
pub mod config;
pub mod interpolate;
pub mod method;
pub mod neighbors;
pub mod paths;
pub mod pipeline;
pub mod stitch;
pub mod tile_name;

pub use batch::{run_batch, run_batch_with, select_num_threads, BatchReport};
pub use clip::{export_and_clip, ClipOptions, ClipReport};
pub use config::PipelineConfig;
pub use interpolate::{interpolate, PdalBackend, RasterBackend, Surface};
pub use method::InterpolationMethod;
pub use paths::{TilePaths, WorkDirs};
pub use pipeline::{run_tile, Pipeline, TileOutcome};
pub use stitch::{stitch, StitchedCloud};
pub use tile_name::{Direction, NeighborSet, TileId};
