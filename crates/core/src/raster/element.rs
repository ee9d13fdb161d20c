//! Raster element trait for elevation cell values

use num_traits::Float;
use std::fmt::Debug;

/// Trait for types that can be stored in an elevation raster cell.
///
/// Elevation rasters are always floating point: a cell either holds a
/// finite height or the raster's no-data sentinel.
pub trait RasterElement:
    Float + Debug + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data.
    ///
    /// NaN is always treated as missing, whatever the declared sentinel.
    fn is_nodata(&self, nodata: Option<Self>) -> bool {
        if self.is_nan() {
            return true;
        }
        match nodata {
            Some(nd) => *self == nd,
            None => false,
        }
    }

    /// Replace non-finite values with `nodata`
    fn finite_or(self, nodata: Self) -> Self {
        if self.is_finite() {
            self
        } else {
            nodata
        }
    }
}

impl RasterElement for f32 {
    fn default_nodata() -> Self {
        -9999.0
    }
}

impl RasterElement for f64 {
    fn default_nodata() -> Self {
        -9999.0
    }
}
