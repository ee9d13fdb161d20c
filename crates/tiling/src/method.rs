//! Interpolation method selection

use lidartile_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Surface reconstruction methods.
///
/// The first four run in process and yield a raster in memory. The two
/// native methods hand a point file to an external raster backend that
/// writes the raster itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InterpolationMethod {
    TinLinear,
    #[default]
    Laplace,
    NaturalNeighbor,
    QuadrantIdw,
    NativeGridIdw,
    NativeGridTin,
}

impl InterpolationMethod {
    pub const ALL: [InterpolationMethod; 6] = [
        InterpolationMethod::TinLinear,
        InterpolationMethod::Laplace,
        InterpolationMethod::NaturalNeighbor,
        InterpolationMethod::QuadrantIdw,
        InterpolationMethod::NativeGridIdw,
        InterpolationMethod::NativeGridTin,
    ];

    /// Name accepted on the command line and in configuration files
    pub fn name(self) -> &'static str {
        match self {
            InterpolationMethod::TinLinear => "startin-TINlinear",
            InterpolationMethod::Laplace => "startin-Laplace",
            InterpolationMethod::NaturalNeighbor => "CGAL-NN",
            InterpolationMethod::QuadrantIdw => "IDWquad",
            InterpolationMethod::NativeGridIdw => "PDAL-IDW",
            InterpolationMethod::NativeGridTin => "PDAL-TIN",
        }
    }

    /// Tag used in output file names
    pub fn file_tag(self) -> &'static str {
        match self {
            InterpolationMethod::TinLinear => "TINlinear",
            InterpolationMethod::Laplace => "Laplace",
            InterpolationMethod::NaturalNeighbor => "NN",
            InterpolationMethod::QuadrantIdw => "IDWquad",
            InterpolationMethod::NativeGridIdw => "IDW",
            InterpolationMethod::NativeGridTin => "TIN",
        }
    }

    /// Whether the raster is produced by the external backend
    pub fn is_native(self) -> bool {
        matches!(self, InterpolationMethod::NativeGridIdw | InterpolationMethod::NativeGridTin)
    }
}

impl FromStr for InterpolationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<String> for InterpolationMethod {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<InterpolationMethod> for String {
    fn from(m: InterpolationMethod) -> Self {
        m.name().to_string()
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
