//! LAS/LAZ point-cloud reading and writing with the `las` crate

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Point3, PointCloud};
use las::point::Classification;
use las::{Builder, Transform, Vector};
use std::path::Path;
use tracing::debug;

/// ASPRS classification code for ground returns
pub const GROUND_CLASS: u8 = 2;

/// Anything that can load ground points from a file path.
///
/// Implementations must report the extent declared by the file itself in
/// [`PointCloud::bounds`], independently of any filtering they apply.
pub trait PointSource: Send + Sync {
    fn read(&self, path: &Path) -> Result<PointCloud>;
}

/// LAS/LAZ reader keeping only the points whose classification is listed
/// in `classes`. An empty `classes` list keeps every point.
#[derive(Debug, Clone)]
pub struct LasReader {
    pub classes: Vec<u8>,
    /// Spatial reference attached to every cloud read (no reprojection)
    pub crs: Option<CRS>,
}

impl LasReader {
    pub fn new(classes: Vec<u8>, crs: Option<CRS>) -> Self {
        Self { classes, crs }
    }

    /// Reader for ground points only
    pub fn ground() -> Self {
        Self::new(vec![GROUND_CLASS], None)
    }

    fn keeps(&self, class: u8) -> bool {
        self.classes.is_empty() || self.classes.contains(&class)
    }
}

impl Default for LasReader {
    fn default() -> Self {
        Self::ground()
    }
}

impl PointSource for LasReader {
    fn read(&self, path: &Path) -> Result<PointCloud> {
        let mut reader = las::Reader::from_path(path).map_err(|e| Error::point_cloud(path, e))?;

        let header_bounds = reader.header().bounds();
        let bounds = BoundingBox::new(
            header_bounds.min.x,
            header_bounds.max.x,
            header_bounds.min.y,
            header_bounds.max.y,
        );

        let mut points = Vec::new();
        let mut skipped = 0usize;
        for point in reader.points() {
            let point = point.map_err(|e| Error::point_cloud(path, e))?;
            if self.keeps(u8::from(point.classification)) {
                points.push(Point3::new(point.x, point.y, point.z));
            } else {
                skipped += 1;
            }
        }

        debug!(
            "Read {} points from {} ({} filtered out by class)",
            points.len(),
            path.display(),
            skipped
        );

        Ok(PointCloud {
            points,
            bounds: Some(bounds),
            crs: self.crs.clone(),
        })
    }
}

/// Write `cloud` as a LAS 1.2 file, every point tagged as ground.
///
/// Coordinates are stored at millimetre resolution with offsets taken from
/// the cloud extent so kilometric projected coordinates fit the 32-bit
/// integer record fields.
pub fn write_las(cloud: &PointCloud, path: &Path) -> Result<()> {
    let origin = cloud
        .bounds
        .or_else(|| BoundingBox::from_points(&cloud.points))
        .map(|b| (b.min_x.floor(), b.min_y.floor()))
        .unwrap_or((0.0, 0.0));
    let min_z = cloud
        .points
        .iter()
        .map(|p| p.z)
        .fold(f64::INFINITY, f64::min);
    let offset_z = if min_z.is_finite() { min_z.floor() } else { 0.0 };

    let mut builder = Builder::from((1, 2));
    builder.transforms = Vector {
        x: Transform {
            scale: 0.001,
            offset: origin.0,
        },
        y: Transform {
            scale: 0.001,
            offset: origin.1,
        },
        z: Transform {
            scale: 0.001,
            offset: offset_z,
        },
    };
    let header = builder
        .into_header()
        .map_err(|e| Error::point_cloud(path, e))?;

    let mut writer = las::Writer::from_path(path, header).map_err(|e| Error::point_cloud(path, e))?;
    for p in &cloud.points {
        let point = las::Point {
            x: p.x,
            y: p.y,
            z: p.z,
            classification: Classification::Ground,
            ..Default::default()
        };
        writer
            .write_point(point)
            .map_err(|e| Error::point_cloud(path, e))?;
    }
    writer.close().map_err(|e| Error::point_cloud(path, e))?;

    debug!("Wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}
