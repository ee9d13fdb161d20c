//! Error types for lidartile

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lidartile operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tile name '{name}': {reason}")]
    MalformedTileName { name: String, reason: String },

    #[error("Unsupported interpolation method: {0}")]
    UnsupportedMethod(String),

    #[error("Cannot write raster {path}: {reason}")]
    RasterWrite { path: PathBuf, reason: String },

    #[error("Point cloud error in {path}: {reason}")]
    PointCloud { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Raster backend failed: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn point_cloud(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::PointCloud {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for lidartile operations
pub type Result<T> = std::result::Result<T, Error>;
