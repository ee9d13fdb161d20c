//! Pipeline configuration
//!
//! Loaded from a YAML file; every section and field is optional and falls
//! back to the defaults below.
//!
//! ```yaml
//! tile_geometry:
//!   tile_coord_scale: 1000
//!   tile_width: 1000
//!   pixel_size: 0.5
//!   no_data_value: -9999
//! io:
//!   spatial_reference: EPSG:2154
//!   classes: [2]
//! buffer_width: 100
//! interpolation:
//!   method: startin-Laplace
//! patch:
//!   min_neighbors: 5
//! cpu_limit: 4
//! ```

use crate::method::InterpolationMethod;
use lidartile_algorithms::interpolation::IdwQuadParams;
use lidartile_algorithms::patch::PatchParams;
use lidartile_core::io::GROUND_CLASS;
use lidartile_core::{Error, Result, CRS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Tile grid and output raster geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileGeometry {
    /// Map units per unit of the coordinates in tile names
    pub tile_coord_scale: f64,
    /// Side of a tile in map units
    pub tile_width: f64,
    pub pixel_size: f64,
    pub no_data_value: f64,
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self {
            tile_coord_scale: 1000.0,
            tile_width: 1000.0,
            pixel_size: 1.0,
            no_data_value: -9999.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Spatial reference attached to the clouds and rasters (no reprojection)
    pub spatial_reference: String,
    /// Classification codes kept when reading; empty keeps every point
    pub classes: Vec<u8>,
    /// Write 64-bit float rasters instead of 32-bit
    pub double_precision: bool,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            spatial_reference: "EPSG:2154".to_string(),
            classes: vec![GROUND_CLASS],
            double_precision: false,
        }
    }
}

/// Parameters forwarded to the external raster backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeParams {
    /// IDW distance exponent
    pub power: f64,
    /// Fallback window, in cells, for cells without points in `radius`
    pub window_size: u32,
    /// Search radius; the backend default is `pixel_size * sqrt(2)`
    pub radius: Option<f64>,
    /// Executable of the backend
    pub program: String,
}

impl Default for NativeParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            window_size: 5,
            radius: None,
            program: "pdal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    pub method: InterpolationMethod,
    pub idw_quad: IdwQuadParams,
    pub native: NativeParams,
}

/// Everything `run_tile` needs besides the file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tile_geometry: TileGeometry,
    pub io: IoConfig,
    /// Margin around the tile from which neighbor points are taken
    pub buffer_width: f64,
    pub interpolation: InterpolationConfig,
    /// Median fill of isolated no-data cells, off when absent
    pub patch: Option<PatchParams>,
    /// Upper bound on batch workers; absent or 0 means no limit
    pub cpu_limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_geometry: TileGeometry::default(),
            io: IoConfig::default(),
            buffer_width: 100.0,
            interpolation: InterpolationConfig::default(),
            patch: None,
            cpu_limit: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_yaml(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.tile_geometry;
        for (name, value) in [
            ("tile_coord_scale", g.tile_coord_scale),
            ("tile_width", g.tile_width),
            ("pixel_size", g.pixel_size),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(Error::InvalidParameter {
                    name,
                    value: value.to_string(),
                    reason: "must be a positive finite number".into(),
                });
            }
        }
        if !g.no_data_value.is_finite() {
            return Err(Error::InvalidParameter {
                name: "no_data_value",
                value: g.no_data_value.to_string(),
                reason: "must be finite".into(),
            });
        }
        if self.buffer_width < 0.0 || !self.buffer_width.is_finite() {
            return Err(Error::InvalidParameter {
                name: "buffer_width",
                value: self.buffer_width.to_string(),
                reason: "must be zero or positive".into(),
            });
        }
        self.crs()?;
        self.interpolation.idw_quad.validate()?;
        if let Some(patch) = &self.patch {
            patch.validate()?;
        }
        Ok(())
    }

    pub fn crs(&self) -> Result<CRS> {
        self.io.spatial_reference.parse()
    }
}
