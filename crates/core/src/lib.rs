//! # lidartile core
//!
//! Core types and I/O shared by the lidartile crates.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced grid
//! - `GeoTransform`: affine transform for georeferencing
//! - `CRS`: coordinate reference system handle (EPSG based)
//! - `BoundingBox`, `Point3`, `PointCloud`: planar extents and ground points
//! - GeoTIFF and LAS/LAZ readers and writers

pub mod crs;
pub mod error;
pub mod geometry;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use geometry::{BoundingBox, Point3, PointCloud};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{BoundingBox, Point3, PointCloud};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
