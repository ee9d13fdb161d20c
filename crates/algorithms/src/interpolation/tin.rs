//! TIN (Triangulated Irregular Network) linear interpolation
//!
//! Each sample takes the height of the plane through the three vertices of
//! the Delaunay triangle that contains it. Samples outside the convex hull
//! of the data are no-data.

use super::delaunay::{Location, Triangulation};
use super::GridSpec;
use lidartile_core::raster::Raster;
use lidartile_core::{Point3, Result};
use tracing::debug;

/// Interpolate `points` onto `grid` by linear interpolation in the
/// Delaunay triangulation.
///
/// Fewer than three distinct points, or collinear points, give an
/// all-no-data grid.
pub fn tin_linear(points: &[Point3], grid: &GridSpec) -> Result<Raster<f64>> {
    grid.validate()?;

    let tri = Triangulation::build(points);
    debug!(
        "TIN: {} vertices, {} triangles, {} duplicates skipped",
        tri.num_vertices(),
        tri.num_triangles(),
        tri.num_duplicates()
    );
    if !tri.has_area() {
        return Ok(grid.nodata_raster());
    }

    let start = tri.any_triangle();
    grid.fill(
        || start,
        |hint, x, y| {
            let q = tri.local(x, y);
            match tri.locate(q, *hint) {
                Some(Location::Inside(t)) => {
                    *hint = t;
                    plane_height(&tri, t, q)
                }
                Some(Location::Outside(t)) => {
                    *hint = t;
                    grid.nodata
                }
                None => grid.nodata,
            }
        },
    )
}

/// Height at local point `q` on the plane of triangle `t`
pub(crate) fn plane_height(tri: &Triangulation, t: usize, q: [f64; 2]) -> f64 {
    let v = tri.triangle(t).v;
    let [a, b, c] = v.map(|i| tri.vertex(i));
    let (u, w0, w1) = barycentric(q, a, b, c);
    u * tri.height(v[0]) + w0 * tri.height(v[1]) + w1 * tri.height(v[2])
}

/// Barycentric coordinates of `q` in triangle (a, b, c)
fn barycentric(q: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> (f64, f64, f64) {
    let v0 = [b[0] - a[0], b[1] - a[1]];
    let v1 = [c[0] - a[0], c[1] - a[1]];
    let v2 = [q[0] - a[0], q[1] - a[1]];

    let det = v0[0] * v1[1] - v1[0] * v0[1];
    let v = (v2[0] * v1[1] - v1[0] * v2[1]) / det;
    let w = (v0[0] * v2[1] - v2[0] * v0[1]) / det;
    (1.0 - v - w, v, w)
}
