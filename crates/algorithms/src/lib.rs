//! # lidartile algorithms
//!
//! Raster-producing algorithms for LIDAR ground points.
//!
//! - **interpolation**: TIN linear, Laplace, Sibson natural neighbor and
//!   quadrant IDW onto a [`GridSpec`](interpolation::GridSpec)
//! - **patch**: median fill of isolated no-data cells
//! - **difference**: height difference of two rasters (DHM)

pub mod difference;
pub mod interpolation;
pub mod patch;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::difference::difference;
    pub use crate::interpolation::{
        idw_quad, laplace, natural_neighbor, tin_linear, GridSpec, IdwQuadParams, SearchMode,
    };
    pub use crate::patch::{patch_nodata, PatchParams};
    pub use lidartile_core::prelude::*;
}
