//! Coordinate Reference System handling
//!
//! Point clouds and rasters carry their spatial reference as metadata only;
//! nothing in lidartile reprojects coordinates.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Free-form definition when no EPSG code applies
    definition: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            definition: None,
        }
    }

    /// Create a CRS from an arbitrary definition (WKT, PROJ string, ...)
    pub fn from_definition(definition: impl Into<String>) -> Self {
        Self {
            epsg: None,
            definition: Some(definition.into()),
        }
    }

    /// RGF93 / Lambert-93, the reference of the French national LIDAR tiles
    pub fn lambert93() -> Self {
        Self::from_epsg(2154)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// Geographic (degree based) reference systems are written with the
    /// GeographicTypeGeoKey instead of ProjectedCSTypeGeoKey
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4326) | Some(4258) | Some(4171))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.definition, &other.definition) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(def) = &self.definition {
            return def.clone();
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Accepts `EPSG:<code>` (case-insensitive), a bare numeric code, or any
    /// other non-empty definition string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidParameter {
                name: "spatial_reference",
                value: String::new(),
                reason: "empty spatial reference".into(),
            });
        }

        let code = match s.split_once(':') {
            Some((authority, code)) if authority.eq_ignore_ascii_case("epsg") => code,
            _ => s,
        };

        match code.parse::<u32>() {
            Ok(code) if code > 0 => Ok(Self::from_epsg(code)),
            _ if code.len() != s.len() => Err(Error::InvalidParameter {
                name: "spatial_reference",
                value: s.to_string(),
                reason: "EPSG code must be a positive integer".into(),
            }),
            _ => Ok(Self::from_definition(s)),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::lambert93()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(2154);
        assert_eq!(crs.epsg(), Some(2154));
        assert_eq!(crs.identifier(), "EPSG:2154");
    }

    #[test]
    fn test_parse_epsg_forms() {
        assert_eq!("EPSG:2154".parse::<CRS>().unwrap(), CRS::lambert93());
        assert_eq!("epsg:4326".parse::<CRS>().unwrap().epsg(), Some(4326));
        assert_eq!("2154".parse::<CRS>().unwrap().epsg(), Some(2154));
    }

    #[test]
    fn test_parse_rejects_bad_code() {
        assert!("EPSG:abc".parse::<CRS>().is_err());
        assert!("".parse::<CRS>().is_err());
    }

    #[test]
    fn test_parse_free_definition() {
        let crs: CRS = "+proj=lcc +lat_1=49".parse().unwrap();
        assert_eq!(crs.epsg(), None);
        assert_eq!(crs.definition(), Some("+proj=lcc +lat_1=49"));
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(2154);
        let b = CRS::lambert93();
        assert!(a.is_equivalent(&b));
    }
}
