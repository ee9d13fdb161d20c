//! Planar extents and point clouds

use crate::crs::CRS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned 2D extent.
///
/// Bounds are inclusive on every side: a point lying exactly on an edge
/// is contained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Smallest box containing all `points`, or `None` if empty
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(first.x, first.x, first.y, first.y);
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Expand by `margin` on all four sides
    pub fn buffered(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            max_x: self.max_x + margin,
            min_y: self.min_y - margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Union of two boxes
    pub fn merge(&self, other: &BoundingBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "([{:.3}, {:.3}], [{:.3}, {:.3}])",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// A ground point in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Points read from one or more point-cloud files.
///
/// `bounds` is the extent reported by the source file header, which can be
/// wider than the extent of the points kept after classification filtering.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<Point3>,
    pub bounds: Option<BoundingBox>,
    pub crs: Option<CRS>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3>) -> Self {
        let bounds = BoundingBox::from_points(&points);
        Self {
            points,
            bounds,
            crs: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append all points of `other`, widening the bounds
    pub fn extend(&mut self, other: PointCloud) {
        self.bounds = match (self.bounds, other.bounds) {
            (Some(a), Some(b)) => Some(a.merge(&b)),
            (a, b) => a.or(b),
        };
        if self.crs.is_none() {
            self.crs = other.crs;
        }
        self.points.extend(other.points);
    }

    /// Keep the points whose planar position lies inside `bbox`.
    /// Z is passed through unchanged.
    pub fn crop(&self, bbox: &BoundingBox) -> PointCloud {
        let points: Vec<Point3> = self
            .points
            .iter()
            .filter(|p| bbox.contains(p.x, p.y))
            .copied()
            .collect();
        PointCloud {
            points,
            bounds: Some(*bbox),
            crs: self.crs.clone(),
        }
    }
}
