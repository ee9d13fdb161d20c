//! Incremental Delaunay triangulation (Bowyer-Watson) with triangle adjacency.
//!
//! Points are inserted inside a large super-triangle made of three sentinel
//! vertices. Triangles store their neighbors so point location is a
//! visibility walk and each insertion only touches the triangles whose
//! circumcircle contains the new point.
//!
//! Coordinates are shifted to the lower-left corner of the input so the
//! geometric predicates work on small numbers even for projected
//! coordinates in the millions of meters.

use lidartile_core::Point3;

/// Marker for a missing neighbor or a free triangle slot
pub(crate) const NONE: usize = usize::MAX;

/// Number of sentinel vertices at the start of the vertex list
const SENTINELS: usize = 3;

/// Squared distance under which two points are the same location
const DUPLICATE_EPS_SQ: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Triangle {
    /// Vertex indices in counter-clockwise order
    pub v: [usize; 3],
    /// `adj[i]` is the triangle across the edge opposite `v[i]`
    pub adj: [usize; 3],
}

impl Triangle {
    fn is_free(&self) -> bool {
        self.v[0] == NONE
    }
}

/// Delaunay triangulation of the planar positions of a point set.
#[derive(Debug)]
pub struct Triangulation {
    verts: Vec<[f64; 2]>,
    z: Vec<f64>,
    tris: Vec<Triangle>,
    shift: (f64, f64),
    duplicates: usize,
}

/// Outcome of locating a query point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Location {
    /// Triangle made only of data vertices
    Inside(usize),
    /// Triangle touching the super-triangle: outside the data hull
    Outside(usize),
}

impl Triangulation {
    /// Triangulate `points`. Points sharing a planar location with an
    /// earlier point are skipped, so the first Z seen for a location wins.
    pub fn build(points: &[Point3]) -> Self {
        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        );
        let shift = if points.is_empty() { (0.0, 0.0) } else { (min_x, min_y) };
        let width = if points.is_empty() { 1.0 } else { (max_x - min_x).max(max_y - min_y).max(1.0) };

        // Sentinels far enough that their triangles hug the convex hull
        let m = width * 1000.0;
        let mut verts = Vec::with_capacity(points.len() + SENTINELS);
        verts.push([-m, -m]);
        verts.push([m + width, -m]);
        verts.push([width * 0.5, m + width]);

        let mut tri = Triangulation {
            verts,
            z: vec![f64::NAN; SENTINELS],
            tris: vec![Triangle {
                v: [0, 1, 2],
                adj: [NONE; 3],
            }],
            shift,
            duplicates: 0,
        };

        let order = insertion_order(points, shift, width);
        let mut inserter = Inserter::default();
        let mut hint = 0;
        for idx in order {
            let p = &points[idx];
            let q = [p.x - shift.0, p.y - shift.1];
            match inserter.insert(&mut tri, q, p.z, hint) {
                Some(t) => hint = t,
                None => tri.duplicates += 1,
            }
        }
        tri
    }

    /// Number of data vertices (duplicates excluded)
    pub fn num_vertices(&self) -> usize {
        self.verts.len() - SENTINELS
    }

    /// Number of input points skipped because their location was taken
    pub fn num_duplicates(&self) -> usize {
        self.duplicates
    }

    /// Number of triangles made only of data vertices
    pub fn num_triangles(&self) -> usize {
        self.tris
            .iter()
            .filter(|t| !t.is_free() && !self.touches_sentinel(t))
            .count()
    }

    /// Whether at least one triangle covers data (3 or more distinct,
    /// non-collinear points)
    pub fn has_area(&self) -> bool {
        self.num_triangles() > 0
    }

    pub(crate) fn local(&self, x: f64, y: f64) -> [f64; 2] {
        [x - self.shift.0, y - self.shift.1]
    }

    pub(crate) fn triangle(&self, t: usize) -> &Triangle {
        &self.tris[t]
    }

    pub(crate) fn vertex(&self, v: usize) -> [f64; 2] {
        self.verts[v]
    }

    pub(crate) fn height(&self, v: usize) -> f64 {
        self.z[v]
    }

    pub(crate) fn is_sentinel(v: usize) -> bool {
        v < SENTINELS
    }

    pub(crate) fn touches_sentinel(&self, t: &Triangle) -> bool {
        t.v.iter().any(|&v| Self::is_sentinel(v))
    }

    /// Any live triangle, used to seed walks
    pub(crate) fn any_triangle(&self) -> usize {
        self.tris.iter().position(|t| !t.is_free()).unwrap_or(0)
    }

    /// Walk from `hint` towards local point `q`.
    ///
    /// A point on an edge shared with the hull is attributed to the data
    /// triangle on the inner side.
    pub(crate) fn locate(&self, q: [f64; 2], hint: usize) -> Option<Location> {
        let t = self.walk(q, hint)?;
        let tri = &self.tris[t];
        if !self.touches_sentinel(tri) {
            return Some(Location::Inside(t));
        }

        for &v in &tri.v {
            if !Self::is_sentinel(v) && dist_sq(self.verts[v], q) <= DUPLICATE_EPS_SQ {
                if let Some(inner) = self.data_triangle_around(t, v) {
                    return Some(Location::Inside(inner));
                }
            }
        }

        for i in 0..3 {
            let a = tri.v[(i + 1) % 3];
            let b = tri.v[(i + 2) % 3];
            let n = tri.adj[i];
            if Self::is_sentinel(a) || Self::is_sentinel(b) || n == NONE {
                continue;
            }
            if on_segment(self.verts[a], self.verts[b], q) && !self.touches_sentinel(&self.tris[n]) {
                return Some(Location::Inside(n));
            }
        }
        Some(Location::Outside(t))
    }

    /// A data triangle among those sharing vertex `v` with triangle `t`
    fn data_triangle_around(&self, t: usize, v: usize) -> Option<usize> {
        let mut seen = vec![t];
        let mut head = 0;
        while head < seen.len() {
            let cur = &self.tris[seen[head]];
            head += 1;
            if !self.touches_sentinel(cur) {
                return Some(seen[head - 1]);
            }
            for i in 0..3 {
                // Only cross edges that have `v` as an endpoint
                let n = cur.adj[i];
                if cur.v[i] == v || n == NONE || seen.contains(&n) {
                    continue;
                }
                seen.push(n);
            }
        }
        None
    }

    fn walk(&self, q: [f64; 2], hint: usize) -> Option<usize> {
        let mut t = if hint < self.tris.len() && !self.tris[hint].is_free() {
            hint
        } else {
            self.any_triangle()
        };

        let max_steps = self.tris.len() + 16;
        // Rotating the first edge tested keeps the walk from cycling
        let mut rot = 0usize;
        'walk: for _ in 0..max_steps {
            let tri = &self.tris[t];
            for k in 0..3 {
                let i = (k + rot) % 3;
                let a = self.verts[tri.v[(i + 1) % 3]];
                let b = self.verts[tri.v[(i + 2) % 3]];
                if orient(a, b, q) < 0.0 {
                    let n = tri.adj[i];
                    if n == NONE {
                        return None;
                    }
                    t = n;
                    rot = rot.wrapping_add(1);
                    continue 'walk;
                }
            }
            return Some(t);
        }

        self.locate_brute_force(q)
    }

    fn locate_brute_force(&self, q: [f64; 2]) -> Option<usize> {
        self.tris.iter().position(|tri| {
            !tri.is_free()
                && (0..3).all(|i| {
                    orient(self.verts[tri.v[(i + 1) % 3]], self.verts[tri.v[(i + 2) % 3]], q) >= 0.0
                })
        })
    }

    /// Whether local point `q` lies strictly inside the circumcircle of
    /// triangle `t`
    pub(crate) fn in_circumcircle(&self, t: usize, q: [f64; 2]) -> bool {
        let [a, b, c] = self.tris[t].v.map(|v| self.verts[v]);
        in_circle(a, b, c, q) > 0.0
    }
}

/// Reusable scratch buffers for point insertion
#[derive(Default)]
struct Inserter {
    cavity: Vec<usize>,
    mark: Vec<u32>,
    epoch: u32,
    boundary: Vec<(usize, usize, usize, usize)>,
}

impl Inserter {
    /// Insert local point `q`; returns a triangle incident to it, or `None`
    /// when the location duplicates an existing vertex.
    fn insert(&mut self, tri: &mut Triangulation, q: [f64; 2], z: f64, hint: usize) -> Option<usize> {
        let start = tri.walk(q, hint)?;
        if tri.tris[start]
            .v
            .iter()
            .any(|&v| dist_sq(tri.verts[v], q) <= DUPLICATE_EPS_SQ)
        {
            return None;
        }

        let p = tri.verts.len();
        tri.verts.push(q);
        tri.z.push(z);

        self.collect_cavity(tri, start, q);
        self.collect_boundary(tri);
        Some(self.fill_fan(tri, p))
    }

    fn next_epoch(&mut self, len: usize) {
        if self.mark.len() < len {
            self.mark.resize(len, 0);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.mark.iter_mut().for_each(|m| *m = 0);
            self.epoch = 1;
        }
    }

    fn in_cavity(&self, t: usize) -> bool {
        self.mark[t] == self.epoch
    }

    /// Triangles whose circumcircle contains `q`, grown so that every
    /// boundary edge sees `q` strictly on its inner side
    fn collect_cavity(&mut self, tri: &Triangulation, start: usize, q: [f64; 2]) {
        self.next_epoch(tri.tris.len());
        self.cavity.clear();
        self.cavity.push(start);
        self.mark[start] = self.epoch;

        let mut head = 0;
        while head < self.cavity.len() {
            let t = self.cavity[head];
            head += 1;
            let cur = tri.tris[t];
            for i in 0..3 {
                let n = cur.adj[i];
                if n == NONE || self.in_cavity(n) {
                    continue;
                }
                let a = tri.verts[cur.v[(i + 1) % 3]];
                let b = tri.verts[cur.v[(i + 2) % 3]];
                if tri.in_circumcircle(n, q) || orient(a, b, q) <= 0.0 {
                    self.mark[n] = self.epoch;
                    self.cavity.push(n);
                }
            }
        }
    }

    /// Cavity boundary as (a, b, outer triangle, slot in outer), CCW
    fn collect_boundary(&mut self, tri: &Triangulation) {
        self.boundary.clear();
        for &t in &self.cavity {
            let cur = &tri.tris[t];
            for i in 0..3 {
                let n = cur.adj[i];
                if n != NONE && self.mark[n] == self.epoch {
                    continue;
                }
                let a = cur.v[(i + 1) % 3];
                let b = cur.v[(i + 2) % 3];
                let slot = if n == NONE {
                    NONE
                } else {
                    let outer = &tri.tris[n];
                    (0..3).find(|&j| outer.adj[j] == t).unwrap_or(NONE)
                };
                self.boundary.push((a, b, n, slot));
            }
        }
    }

    /// Replace the cavity with a fan of triangles around vertex `p`
    fn fill_fan(&mut self, tri: &mut Triangulation, p: usize) -> usize {
        let mut slots: Vec<usize> = Vec::with_capacity(self.boundary.len());
        let mut reuse = self.cavity.iter().copied();
        for _ in 0..self.boundary.len() {
            match reuse.next() {
                Some(s) => slots.push(s),
                None => {
                    tri.tris.push(Triangle {
                        v: [NONE; 3],
                        adj: [NONE; 3],
                    });
                    slots.push(tri.tris.len() - 1);
                }
            }
        }
        // Cavity triangles not reused become free slots
        for s in reuse {
            tri.tris[s] = Triangle {
                v: [NONE; 3],
                adj: [NONE; 3],
            };
        }

        for (k, &(a, b, outer, slot)) in self.boundary.iter().enumerate() {
            let t = slots[k];
            tri.tris[t] = Triangle {
                v: [a, b, p],
                adj: [NONE, NONE, outer],
            };
            if outer != NONE && slot != NONE {
                tri.tris[outer].adj[slot] = t;
            }
        }

        // Fan neighbors: the triangle on edge (a, b) meets the one starting
        // at b across (b, p) and the one ending at a across (p, a)
        for (k, &(a, b, _, _)) in self.boundary.iter().enumerate() {
            let t = slots[k];
            let after = self.boundary.iter().position(|e| e.0 == b).map(|j| slots[j]);
            let before = self.boundary.iter().position(|e| e.1 == a).map(|j| slots[j]);
            tri.tris[t].adj[0] = after.unwrap_or(NONE);
            tri.tris[t].adj[1] = before.unwrap_or(NONE);
        }

        slots.first().copied().unwrap_or(0)
    }
}

/// Input indices in a serpentine strip order so consecutive insertions are
/// spatially close. The sort is stable, so coincident points keep their
/// input order.
fn insertion_order(points: &[Point3], shift: (f64, f64), width: f64) -> Vec<usize> {
    let n = points.len().max(1) as f64;
    let strip = (width / n.sqrt().max(1.0) * 4.0).max(f64::MIN_POSITIVE);

    let key = |p: &Point3| -> (i64, f64) {
        let s = ((p.y - shift.1) / strip).floor() as i64;
        let x = p.x - shift.0;
        (s, if s % 2 == 0 { x } else { -x })
    };

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        let (si, xi) = key(&points[i]);
        let (sj, xj) = key(&points[j]);
        si.cmp(&sj)
            .then(xi.partial_cmp(&xj).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| {
                (points[i].y)
                    .partial_cmp(&points[j].y)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    order
}

/// Twice the signed area of (a, b, c); positive when counter-clockwise
#[inline]
pub(crate) fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Positive when `d` lies inside the circumcircle of CCW triangle (a, b, c)
#[inline]
fn in_circle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> f64 {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);
    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;
    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

#[inline]
pub(crate) fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn on_segment(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> bool {
    let len_sq = dist_sq(a, b);
    let cross = orient(a, b, q);
    if cross * cross > 1e-18 * len_sq * len_sq.max(1.0) {
        return false;
    }
    let t = ((q[0] - a[0]) * (b[0] - a[0]) + (q[1] - a[1]) * (b[1] - a[1])) / len_sq;
    (0.0..=1.0).contains(&t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_points(n: usize, step: f64) -> Vec<Point3> {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let x = i as f64 * step;
                let y = j as f64 * step;
                pts.push(Point3::new(x, y, x + 2.0 * y));
            }
        }
        pts
    }

    /// Every live triangle is CCW and its adjacency is mutual
    fn assert_consistent(tri: &Triangulation) {
        for (t, cur) in tri.tris.iter().enumerate() {
            if cur.is_free() {
                continue;
            }
            let [a, b, c] = cur.v.map(|v| tri.verts[v]);
            assert!(orient(a, b, c) > 0.0, "triangle {t} is not CCW");
            for i in 0..3 {
                let n = cur.adj[i];
                if n == NONE {
                    continue;
                }
                assert!(
                    tri.tris[n].adj.contains(&t),
                    "adjacency of {t} and {n} is not mutual"
                );
            }
        }
    }

    #[test]
    fn test_square_gives_two_triangles() {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
        ];
        let tri = Triangulation::build(&pts);
        assert_eq!(tri.num_vertices(), 4);
        assert_eq!(tri.num_triangles(), 2);
        assert_consistent(&tri);
    }

    #[test]
    fn test_grid_triangle_count() {
        // n x n lattice: 2 (n-1)^2 triangles
        let tri = Triangulation::build(&grid_points(8, 1.5));
        assert_eq!(tri.num_triangles(), 2 * 7 * 7);
        assert_consistent(&tri);
    }

    #[test]
    fn test_projected_coordinates() {
        let pts: Vec<Point3> = grid_points(6, 2.0)
            .into_iter()
            .map(|p| Point3::new(p.x + 770_000.0, p.y + 6_278_000.0, p.z))
            .collect();
        let tri = Triangulation::build(&pts);
        assert_eq!(tri.num_triangles(), 50);
        assert_consistent(&tri);
    }

    #[test]
    fn test_duplicates_skipped() {
        let mut pts = grid_points(4, 1.0);
        pts.push(Point3::new(1.0, 1.0, 99.0));
        pts.push(Point3::new(2.0, 3.0, 77.0));
        let tri = Triangulation::build(&pts);
        assert_eq!(tri.num_vertices(), 16);
        assert_eq!(tri.num_duplicates(), 2);

        // the first height seen for (1, 1) is kept
        let v = (SENTINELS..tri.verts.len())
            .find(|&v| tri.verts[v] == tri.local(1.0, 1.0))
            .unwrap();
        assert_eq!(tri.height(v), 3.0);
    }

    #[test]
    fn test_collinear_has_no_area() {
        let pts: Vec<Point3> = (0..10).map(|i| Point3::new(i as f64, 2.0 * i as f64, 1.0)).collect();
        let tri = Triangulation::build(&pts);
        assert!(!tri.has_area());
        assert_consistent(&tri);
    }

    #[test]
    fn test_scattered_points_are_consistent() {
        let pts: Vec<Point3> = (0..500)
            .map(|i| {
                let x = ((i * 7919) % 1000) as f64 * 0.173;
                let y = ((i * 104_729) % 997) as f64 * 0.211;
                Point3::new(x, y, 0.0)
            })
            .collect();
        let tri = Triangulation::build(&pts);
        assert_consistent(&tri);
        assert!(tri.has_area());
    }

    #[test]
    fn test_locate_inside_and_outside() {
        let tri = Triangulation::build(&grid_points(5, 1.0));
        let hint = tri.any_triangle();
        assert!(matches!(tri.locate(tri.local(1.5, 2.5), hint), Some(Location::Inside(_))));
        // on the hull edge x = 0 and on the hull corner
        assert!(matches!(tri.locate(tri.local(0.0, 1.5), hint), Some(Location::Inside(_))));
        assert!(matches!(tri.locate(tri.local(4.0, 4.0), hint), Some(Location::Inside(_))));
        assert!(matches!(tri.locate(tri.local(-1.0, 1.5), hint), Some(Location::Outside(_))));
    }
}
