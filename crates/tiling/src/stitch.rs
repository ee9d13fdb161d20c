//! Buffered point cloud of a tile and its neighbors

use lidartile_core::io::PointSource;
use lidartile_core::{BoundingBox, PointCloud, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Ground points of a tile plus the neighbor points within its buffer
#[derive(Debug, Clone)]
pub struct StitchedCloud {
    pub cloud: PointCloud,
    /// Extent declared by the tile's own header
    pub native_bounds: BoundingBox,
    /// `native_bounds` widened by the buffer width
    pub buffered_bounds: BoundingBox,
    /// Points read from every file before cropping
    pub points_read: usize,
    /// Neighbor files that contributed
    pub neighbors_used: Vec<PathBuf>,
}

impl StitchedCloud {
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }
}

/// Merge the tile at `self_path` with `neighbor_paths` and crop the result
/// to the tile's header extent buffered by `buffer_width`.
///
/// An empty result is returned as-is; it is up to the interpolation step to
/// turn it into a no-data raster.
pub fn stitch<S: PointSource + ?Sized>(
    self_path: &Path,
    neighbor_paths: &[PathBuf],
    buffer_width: f64,
    reader: &S,
) -> Result<StitchedCloud> {
    let start = Instant::now();
    let own = reader.read(self_path)?;
    let native_bounds = own
        .bounds
        .or_else(|| BoundingBox::from_points(&own.points))
        .unwrap_or_default();
    let buffered_bounds = native_bounds.buffered(buffer_width.max(0.0));

    let mut points_read = own.len();
    let mut combined = own.crop(&buffered_bounds);
    for path in neighbor_paths {
        let neighbor = reader.read(path)?;
        points_read += neighbor.len();
        let kept = neighbor.crop(&buffered_bounds);
        debug!("{}: {} of {} points in buffer", path.display(), kept.len(), neighbor.len());
        combined.extend(kept);
    }
    combined.bounds = Some(buffered_bounds);

    info!(
        "Stitched {} neighbors: {} of {} points kept in {}",
        neighbor_paths.len(),
        combined.len(),
        points_read,
        buffered_bounds
    );
    debug!("Stitching took {:.2?} (pid {})", start.elapsed(), std::process::id());

    Ok(StitchedCloud {
        cloud: combined,
        native_bounds,
        buffered_bounds,
        points_read,
        neighbors_used: neighbor_paths.to_vec(),
    })
}
