//! Quadrant inverse distance weighting
//!
//! For every sample a k-d tree query collects nearby points. The query is
//! widened until each of the four quadrants around the sample holds enough
//! points, which keeps the estimate from leaning on one side of the sample
//! (typically at the edge of the data).

use super::kdtree::{KdTree, NearestResult};
use super::GridSpec;
use lidartile_core::raster::Raster;
use lidartile_core::{Error, Point3, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the neighborhood of a sample is queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Every point within a radius (map units)
    #[default]
    Radial,
    /// A fixed number of nearest points
    KNearest,
}

/// Parameters for quadrant IDW
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdwQuadParams {
    /// Initial radius, or initial neighbor count in [`SearchMode::KNearest`]
    pub start: f64,
    /// Added to the radius (or count) after each failed attempt
    pub increment: f64,
    /// Distance exponent
    pub power: f64,
    /// Points required in every quadrant
    pub min_points: usize,
    /// Widenings tried after the initial query
    pub max_iterations: usize,
    pub mode: SearchMode,
}

impl Default for IdwQuadParams {
    fn default() -> Self {
        Self {
            start: 5.0,
            increment: 2.0,
            power: 2.0,
            min_points: 1,
            max_iterations: 3,
            mode: SearchMode::Radial,
        }
    }
}

impl IdwQuadParams {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(Error::InvalidParameter {
                    name,
                    value: v.to_string(),
                    reason: "must be a positive finite number".into(),
                })
            }
        };
        positive("start", self.start)?;
        positive("power", self.power)?;
        if self.increment < 0.0 || !self.increment.is_finite() {
            return Err(Error::InvalidParameter {
                name: "increment",
                value: self.increment.to_string(),
                reason: "must be zero or positive".into(),
            });
        }
        Ok(())
    }
}

/// Interpolate `points` onto `grid` with quadrant IDW.
///
/// A sample whose neighborhood never reaches `min_points` in all four
/// quadrants within `max_iterations` widenings is no-data.
pub fn idw_quad(points: &[Point3], grid: &GridSpec, params: &IdwQuadParams) -> Result<Raster<f64>> {
    grid.validate()?;
    params.validate()?;

    if points.is_empty() {
        return Ok(grid.nodata_raster());
    }

    let tree = KdTree::build(points);
    debug!(
        "IDWquad: {} points, {:?} search from {} by {}",
        tree.len(),
        params.mode,
        params.start,
        params.increment
    );

    grid.fill(|| (), |_, x, y| estimate(&tree, x, y, params).unwrap_or(grid.nodata))
}

fn estimate(tree: &KdTree, x: f64, y: f64, params: &IdwQuadParams) -> Option<f64> {
    let mut reach = params.start;
    for _ in 0..=params.max_iterations {
        let found = match params.mode {
            SearchMode::Radial => tree.within_radius(x, y, reach),
            SearchMode::KNearest => tree.k_nearest(x, y, reach.ceil() as usize),
        };
        if balanced(&found, x, y, params.min_points) {
            return Some(weighted_mean(&found, params.power));
        }
        reach += params.increment;
    }
    None
}

/// Whether each strict quadrant around (x, y) holds at least `min` points.
/// Points on either axis through the sample belong to no quadrant.
fn balanced(found: &[NearestResult], x: f64, y: f64, min: usize) -> bool {
    let mut counts = [0usize; 4];
    for r in found {
        let (px, py) = (r.point.x, r.point.y);
        let q = match (px < x, px > x, py < y, py > y) {
            (true, _, true, _) => 0,
            (_, true, true, _) => 1,
            (true, _, _, true) => 2,
            (_, true, _, true) => 3,
            _ => continue,
        };
        counts[q] += 1;
    }
    counts.iter().all(|&c| c >= min)
}

fn weighted_mean(found: &[NearestResult], power: f64) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for r in found {
        if r.distance_sq == 0.0 {
            return r.point.z;
        }
        let w = 1.0 / r.distance_sq.sqrt().powf(power);
        num += w * r.point.z;
        den += w;
    }
    num / den
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cross_points() -> Vec<Point3> {
        // one point per quadrant around (0, 0), at distance sqrt(2)
        vec![
            Point3::new(-1.0, -1.0, 10.0),
            Point3::new(1.0, -1.0, 20.0),
            Point3::new(-1.0, 1.0, 30.0),
            Point3::new(1.0, 1.0, 40.0),
        ]
    }

    fn single_sample() -> GridSpec {
        GridSpec::new(1, 1, 0.0, 0.0, 1.0, -9999.0)
    }

    #[test]
    fn test_equidistant_quadrants_average() {
        let params = IdwQuadParams {
            start: 2.0,
            ..Default::default()
        };
        let raster = idw_quad(&cross_points(), &single_sample(), &params).unwrap();
        assert_relative_eq!(raster.get(0, 0).unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_search_widens_until_balanced() {
        // radius 1 finds nothing, radius 1 + 1 reaches all four corners
        let params = IdwQuadParams {
            start: 1.0,
            increment: 1.0,
            max_iterations: 1,
            ..Default::default()
        };
        let raster = idw_quad(&cross_points(), &single_sample(), &params).unwrap();
        assert_relative_eq!(raster.get(0, 0).unwrap(), 25.0, epsilon = 1e-9);

        let params = IdwQuadParams {
            max_iterations: 0,
            ..params
        };
        let raster = idw_quad(&cross_points(), &single_sample(), &params).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), -9999.0);
    }

    #[test]
    fn test_unreachable_min_points_is_nodata() {
        let params = IdwQuadParams {
            start: 5.0,
            increment: 2.0,
            min_points: 2,
            max_iterations: 3,
            ..Default::default()
        };
        let raster = idw_quad(&cross_points(), &single_sample(), &params).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), -9999.0);
    }

    #[test]
    fn test_points_on_axes_do_not_count() {
        let pts = vec![
            Point3::new(-1.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(0.0, -1.0, 1.0),
        ];
        let raster = idw_quad(&pts, &single_sample(), &IdwQuadParams::default()).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), -9999.0);
    }

    #[test]
    fn test_exact_hit_returns_height() {
        let mut pts = cross_points();
        pts.push(Point3::new(0.0, 0.0, 99.0));
        let raster = idw_quad(&pts, &single_sample(), &IdwQuadParams::default()).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), 99.0);
    }

    #[test]
    fn test_k_nearest_mode() {
        let mut pts = cross_points();
        // far point that only enters once k reaches 5
        pts.push(Point3::new(10.0, 10.0, 1000.0));
        let params = IdwQuadParams {
            start: 4.0,
            mode: SearchMode::KNearest,
            ..Default::default()
        };
        let raster = idw_quad(&pts, &single_sample(), &params).unwrap();
        assert_relative_eq!(raster.get(0, 0).unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_cloud_and_bad_params() {
        let raster = idw_quad(&[], &single_sample(), &IdwQuadParams::default()).unwrap();
        assert_eq!(raster.nodata_count(), 1);

        let params = IdwQuadParams {
            power: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            idw_quad(&cross_points(), &single_sample(), &params),
            Err(Error::InvalidParameter { name: "power", .. })
        ));
    }
}
