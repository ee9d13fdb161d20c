//! Natural neighbor interpolation (Sibson and Laplace)
//!
//! Both methods inspect the triangles whose circumcircle contains the
//! sample (the conflict zone). Inserting the sample would create a new
//! Voronoi cell; its vertices are the circumcenters `g(a, b)` of the sample
//! with each pair of natural neighbors.
//!
//! - Sibson weights are the areas the new cell steals from each neighbor.
//!   They are summed per conflict triangle with Watson's decomposition:
//!   for triangle (i, j, k) with circumcenter `c`, vertex `i` gains the
//!   signed area of `(c, g(i, j), g(k, i))`.
//! - Laplace weights are the length of the Voronoi edge shared with the
//!   neighbor divided by the distance to it. The edge is the telescoping
//!   sum of `g(k, i) - g(i, j)` over the same triangles.
//!
//! Triangles touching the super-triangle are never part of the conflict
//! zone, which treats the sentinels as points at infinity.
//!
//! Reference:
//! Sibson, R. (1981). "A brief description of natural neighbour interpolation."
//! Watson, D.F. (1992). Contouring: A Guide to the Analysis and Display of
//! Spatial Data.

use super::delaunay::{dist_sq, orient, Location, Triangulation, NONE};
use super::tin::plane_height;
use super::GridSpec;
use lidartile_core::raster::Raster;
use lidartile_core::{Point3, Result};
use tracing::debug;

/// Relative cross product under which the sample is taken to lie on the
/// segment between two neighbors
const COLLINEAR_EPS: f64 = 1e-7;

/// Distance a sample on an edge is moved off it, relative to the edge length
const EDGE_NUDGE: f64 = 4.0 * COLLINEAR_EPS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weighting {
    Sibson,
    Laplace,
}

/// Sibson natural neighbor interpolation.
///
/// Coincident points are collapsed keeping the first height seen. Samples
/// outside the convex hull of the data are no-data.
pub fn natural_neighbor(points: &[Point3], grid: &GridSpec) -> Result<Raster<f64>> {
    interpolate(points, grid, Weighting::Sibson)
}

/// Laplace (non-Sibsonian) natural neighbor interpolation on the Delaunay
/// triangulation.
///
/// Samples outside the convex hull of the data are no-data; a sample on a
/// data point returns its height.
pub fn laplace(points: &[Point3], grid: &GridSpec) -> Result<Raster<f64>> {
    interpolate(points, grid, Weighting::Laplace)
}

struct Scratch {
    hint: usize,
    conflict: Vec<usize>,
    acc: Vec<(usize, [f64; 2])>,
}

fn interpolate(points: &[Point3], grid: &GridSpec, weighting: Weighting) -> Result<Raster<f64>> {
    grid.validate()?;

    let tri = Triangulation::build(points);
    debug!(
        "{:?}: {} vertices, {} triangles, {} duplicates skipped",
        weighting,
        tri.num_vertices(),
        tri.num_triangles(),
        tri.num_duplicates()
    );
    if !tri.has_area() {
        return Ok(grid.nodata_raster());
    }

    let start = tri.any_triangle();
    grid.fill(
        || Scratch {
            hint: start,
            conflict: Vec::with_capacity(16),
            acc: Vec::with_capacity(16),
        },
        |scratch, x, y| {
            let q = tri.local(x, y);
            match tri.locate(q, scratch.hint) {
                Some(Location::Inside(t)) => {
                    scratch.hint = t;
                    evaluate(&tri, t, q, weighting, scratch)
                }
                Some(Location::Outside(t)) => {
                    scratch.hint = t;
                    grid.nodata
                }
                None => grid.nodata,
            }
        },
    )
}

fn evaluate(tri: &Triangulation, t: usize, q: [f64; 2], weighting: Weighting, scratch: &mut Scratch) -> f64 {
    let located = tri.triangle(t);
    for &v in &located.v {
        if dist_sq(tri.vertex(v), q) <= 1e-12 {
            return tri.height(v);
        }
    }

    match weighted_height(tri, t, q, weighting, scratch) {
        Ok(z) => z,
        Err(Degenerate::OnEdge(a, b)) => across_edge(tri, t, q, (a, b), weighting, scratch),
        Err(Degenerate::Sliver) => plane_height(tri, t, q),
    }
}

/// Why the weights cannot be computed at a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degenerate {
    /// The sample lies on the edge between these two vertices
    OnEdge(usize, usize),
    /// A conflict triangle has no circumcenter
    Sliver,
}

fn weighted_height(
    tri: &Triangulation,
    t: usize,
    q: [f64; 2],
    weighting: Weighting,
    scratch: &mut Scratch,
) -> std::result::Result<f64, Degenerate> {
    collect_conflict(tri, t, q, &mut scratch.conflict);
    scratch.acc.clear();

    for &ct in &scratch.conflict {
        let v = tri.triangle(ct).v;
        // Positions relative to the sample
        let p = v.map(|i| {
            let w = tri.vertex(i);
            [w[0] - q[0], w[1] - q[1]]
        });

        let mut g = [[0.0; 2]; 3];
        for i in 0..3 {
            g[i] = circumcenter_with_origin(p[i], p[(i + 1) % 3])
                .ok_or(Degenerate::OnEdge(v[i], v[(i + 1) % 3]))?;
        }
        let c = circumcenter(p[0], p[1], p[2]).ok_or(Degenerate::Sliver)?;

        for i in 0..3 {
            let g_ij = g[i];
            let g_ki = g[(i + 2) % 3];
            let contribution = match weighting {
                Weighting::Sibson => [0.5 * orient(c, g_ij, g_ki), 0.0],
                Weighting::Laplace => [g_ki[0] - g_ij[0], g_ki[1] - g_ij[1]],
            };
            accumulate(&mut scratch.acc, v[i], contribution);
        }
    }

    let mut total = 0.0;
    let mut sum = 0.0;
    for &(vi, d) in &scratch.acc {
        let weight = match weighting {
            Weighting::Sibson => d[0].abs(),
            Weighting::Laplace => {
                let w = tri.vertex(vi);
                (d[0] * d[0] + d[1] * d[1]).sqrt() / dist_sq(w, q).sqrt()
            }
        };
        total += weight;
        sum += weight * tri.height(vi);
    }

    if total > 0.0 && total.is_finite() {
        Ok(sum / total)
    } else {
        Err(Degenerate::Sliver)
    }
}

/// Sample lying on the edge `(a, b)`: mean of the values just off the edge
/// on either side. On a hull edge one side is outside the data and the
/// coordinates reduce to linear interpolation along the edge.
fn across_edge(
    tri: &Triangulation,
    t: usize,
    q: [f64; 2],
    (a, b): (usize, usize),
    weighting: Weighting,
    scratch: &mut Scratch,
) -> f64 {
    let (pa, pb) = (tri.vertex(a), tri.vertex(b));
    // perpendicular to the edge, far enough to clear COLLINEAR_EPS
    let offset = [
        -(pb[1] - pa[1]) * EDGE_NUDGE,
        (pb[0] - pa[0]) * EDGE_NUDGE,
    ];

    let mut sum = 0.0;
    for side in [1.0, -1.0] {
        let nudged = [q[0] + side * offset[0], q[1] + side * offset[1]];
        let z = match tri.locate(nudged, t) {
            Some(Location::Inside(tn)) => weighted_height(tri, tn, nudged, weighting, scratch).ok(),
            _ => None,
        };
        match z {
            Some(z) => sum += z,
            None => return plane_height(tri, t, q),
        }
    }
    0.5 * sum
}

/// Data triangles whose circumcircle strictly contains `q`, grown from the
/// triangle `seed` that contains it
fn collect_conflict(tri: &Triangulation, seed: usize, q: [f64; 2], out: &mut Vec<usize>) {
    out.clear();
    out.push(seed);
    let mut head = 0;
    while head < out.len() {
        let cur = out[head];
        head += 1;
        for &n in &tri.triangle(cur).adj {
            if n == NONE || out.contains(&n) {
                continue;
            }
            if tri.touches_sentinel(tri.triangle(n)) || !tri.in_circumcircle(n, q) {
                continue;
            }
            out.push(n);
        }
    }
}

fn accumulate(acc: &mut Vec<(usize, [f64; 2])>, v: usize, d: [f64; 2]) {
    match acc.iter_mut().find(|(i, _)| *i == v) {
        Some((_, sum)) => {
            sum[0] += d[0];
            sum[1] += d[1];
        }
        None => acc.push((v, d)),
    }
}

/// Circumcenter of (0, a, b); `None` when the three are nearly collinear
fn circumcenter_with_origin(a: [f64; 2], b: [f64; 2]) -> Option<[f64; 2]> {
    let cross = a[0] * b[1] - a[1] * b[0];
    let la = a[0] * a[0] + a[1] * a[1];
    let lb = b[0] * b[0] + b[1] * b[1];
    if cross.abs() <= COLLINEAR_EPS * (la * lb).sqrt() {
        return None;
    }
    let d = 2.0 * cross;
    Some([(b[1] * la - a[1] * lb) / d, (a[0] * lb - b[0] * la) / d])
}

fn circumcenter(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<[f64; 2]> {
    let ba = [b[0] - a[0], b[1] - a[1]];
    let ca = [c[0] - a[0], c[1] - a[1]];
    circumcenter_with_origin(ba, ca).map(|u| [a[0] + u[0], a[1] + u[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lidartile_core::BoundingBox;

    fn scattered(n: usize, f: impl Fn(f64, f64) -> f64) -> Vec<Point3> {
        let mut pts = vec![
            Point3::new(0.0, 0.0, f(0.0, 0.0)),
            Point3::new(20.0, 0.0, f(20.0, 0.0)),
            Point3::new(0.0, 20.0, f(0.0, 20.0)),
            Point3::new(20.0, 20.0, f(20.0, 20.0)),
        ];
        for i in 0..n {
            let x = ((i * 37 + 11) % 97) as f64 / 97.0 * 20.0;
            let y = ((i * 61 + 29) % 89) as f64 / 89.0 * 20.0;
            pts.push(Point3::new(x, y, f(x, y)));
        }
        pts
    }

    fn grid() -> GridSpec {
        GridSpec::covering(&BoundingBox::new(0.0, 20.0, 0.0, 20.0), 1.0, -9999.0).unwrap()
    }

    #[test]
    fn test_circumcenter_of_right_triangle() {
        let c = circumcenter([0.0, 0.0], [4.0, 0.0], [0.0, 2.0]).unwrap();
        assert_relative_eq!(c[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(c[1], 1.0, epsilon = 1e-12);
        assert!(circumcenter_with_origin([1.0, 1.0], [2.0, 2.0]).is_none());
    }

    #[test]
    fn test_sibson_reproduces_plane() {
        let f = |x: f64, y: f64| 0.5 * x - 1.5 * y + 40.0;
        let raster = natural_neighbor(&scattered(60, f), &grid()).unwrap();
        let g = grid();
        for row in 0..g.rows {
            for col in 0..g.cols {
                let (x, y) = g.sample(col, row);
                assert_relative_eq!(raster.get(row, col).unwrap(), f(x, y), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_laplace_reproduces_plane() {
        let f = |x: f64, y: f64| -0.25 * x + 0.75 * y + 12.0;
        let raster = laplace(&scattered(60, f), &grid()).unwrap();
        let g = grid();
        for row in 0..g.rows {
            for col in 0..g.cols {
                let (x, y) = g.sample(col, row);
                assert_relative_eq!(raster.get(row, col).unwrap(), f(x, y), epsilon = 1e-6);
            }
        }
    }

    fn square() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 8.0),
        ]
    }

    fn at(f: fn(&[Point3], &GridSpec) -> Result<Raster<f64>>, pts: &[Point3], x: f64, y: f64) -> f64 {
        f(pts, &GridSpec::new(1, 1, x, y, 1.0, -9999.0)).unwrap().get(0, 0).unwrap()
    }

    #[test]
    fn test_symmetric_square_center_is_mean() {
        // the center lies on the diagonal shared by both triangles
        let pts = square();
        for f in [natural_neighbor, laplace] {
            assert_relative_eq!(at(f, &pts, 1.0, 1.0), 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_continuous_across_interior_edge() {
        let pts = square();
        for f in [natural_neighbor, laplace] {
            let on_edge = at(f, &pts, 1.0, 1.0);
            for (x, y) in [(1.001, 1.0), (0.999, 1.0), (1.0, 1.001), (1.0, 0.999)] {
                assert!((at(f, &pts, x, y) - on_edge).abs() < 0.01, "({x}, {y})");
            }
        }
        // a point of the other diagonal, away from the center
        for f in [natural_neighbor, laplace] {
            let on_edge = at(f, &pts, 1.5, 0.5);
            let beside = at(f, &pts, 1.5005, 0.5005);
            assert!((on_edge - beside).abs() < 0.01);
        }
    }

    #[test]
    fn test_hull_edge_is_linear() {
        let pts = square();
        for f in [natural_neighbor, laplace] {
            assert_relative_eq!(at(f, &pts, 2.0, 1.0), 4.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sample_on_data_point_returns_height() {
        let pts = scattered(30, |x, y| x * y);
        let target = pts[7];
        let grid = GridSpec::new(1, 1, target.x, target.y, 1.0, -9999.0);
        assert_relative_eq!(
            natural_neighbor(&pts, &grid).unwrap().get(0, 0).unwrap(),
            target.z,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            laplace(&pts, &grid).unwrap().get(0, 0).unwrap(),
            target.z,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_outside_hull_is_nodata() {
        let pts = scattered(20, |_, _| 5.0);
        let grid = GridSpec::new(2, 1, -3.5, 10.0, 13.5, -9999.0);
        let raster = natural_neighbor(&pts, &grid).unwrap();
        assert_eq!(raster.get(0, 0).unwrap(), -9999.0);
        assert_relative_eq!(raster.get(0, 1).unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicates_keep_first_height() {
        let pts = vec![
            Point3::new(0.0, 0.0, 10.0),
            Point3::new(4.0, 0.0, 10.0),
            Point3::new(0.0, 4.0, 10.0),
            Point3::new(4.0, 4.0, 10.0),
            Point3::new(4.0, 4.0, 500.0),
        ];
        let grid = GridSpec::new(1, 1, 4.0, 4.0, 1.0, -9999.0);
        assert_eq!(natural_neighbor(&pts, &grid).unwrap().get(0, 0).unwrap(), 10.0);
    }

    #[test]
    fn test_fewer_than_three_points_all_nodata() {
        let pts = vec![Point3::new(1.0, 1.0, 1.0), Point3::new(1.0, 1.0, 2.0), Point3::new(3.0, 3.0, 2.0)];
        let raster = natural_neighbor(&pts, &grid()).unwrap();
        assert_eq!(raster.nodata_count(), grid().len());
    }
}
