//! 2D k-d tree over the planar position of ground points
//!
//! The tree is stored implicitly: points are reordered so that the median of
//! every sub-slice is its splitting node, alternating x and y with depth.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use lidartile_core::Point3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Spatial index answering nearest, k-nearest and radius queries.
#[derive(Debug, Clone)]
pub struct KdTree {
    /// Points in tree order
    points: Vec<Point3>,
    /// Position of each tree-ordered point in the input slice
    indices: Vec<usize>,
}

/// A point returned by a query
#[derive(Debug, Clone, Copy)]
pub struct NearestResult {
    pub point: Point3,
    pub distance_sq: f64,
    /// Index of the point in the slice the tree was built from
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance_sq: f64,
    slot: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn axis(p: &Point3, depth: usize) -> f64 {
    split(p.x, p.y, depth)
}

#[inline]
fn split(x: f64, y: f64, depth: usize) -> f64 {
    if depth % 2 == 0 {
        x
    } else {
        y
    }
}

impl KdTree {
    pub fn build(points: &[Point3]) -> Self {
        let mut items: Vec<(usize, Point3)> = points.iter().copied().enumerate().collect();
        arrange(&mut items, 0);
        let (indices, points) = items.into_iter().unzip();
        Self { points, indices }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest point to (qx, qy), `None` on an empty tree
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<NearestResult> {
        self.k_nearest(qx, qy, 1).into_iter().next()
    }

    /// Up to `k` closest points sorted by ascending distance.
    ///
    /// Ties are broken by tree position so the result is deterministic.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<NearestResult> {
        if k == 0 || self.points.is_empty() {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.knn(0, self.points.len(), 0, qx, qy, k, &mut heap);
        heap.into_sorted_vec()
            .into_iter()
            .map(|c| self.result(c))
            .collect()
    }

    /// Every point at distance `<= radius`, sorted by ascending distance
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<NearestResult> {
        if radius < 0.0 || self.points.is_empty() {
            return Vec::new();
        }
        let mut found = Vec::new();
        self.radius(0, self.points.len(), 0, qx, qy, radius * radius, &mut found);
        found.sort();
        found.into_iter().map(|c| self.result(c)).collect()
    }

    fn result(&self, c: Candidate) -> NearestResult {
        NearestResult {
            point: self.points[c.slot],
            distance_sq: c.distance_sq,
            index: self.indices[c.slot],
        }
    }

    fn distance_sq(&self, slot: usize, qx: f64, qy: f64) -> f64 {
        let p = &self.points[slot];
        let (dx, dy) = (p.x - qx, p.y - qy);
        dx * dx + dy * dy
    }

    #[allow(clippy::too_many_arguments)]
    fn knn(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        qx: f64,
        qy: f64,
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let candidate = Candidate {
            distance_sq: self.distance_sq(mid, qx, qy),
            slot: mid,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }

        let diff = split(qx, qy, depth) - axis(&self.points[mid], depth);
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.knn(near.0, near.1, depth + 1, qx, qy, k, heap);

        let bound = if heap.len() < k {
            f64::INFINITY
        } else {
            heap.peek().map_or(f64::INFINITY, |c| c.distance_sq)
        };
        if diff * diff <= bound {
            self.knn(far.0, far.1, depth + 1, qx, qy, k, heap);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn radius(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        qx: f64,
        qy: f64,
        radius_sq: f64,
        found: &mut Vec<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let distance_sq = self.distance_sq(mid, qx, qy);
        if distance_sq <= radius_sq {
            found.push(Candidate { distance_sq, slot: mid });
        }

        let diff = split(qx, qy, depth) - axis(&self.points[mid], depth);
        if diff <= 0.0 || diff * diff <= radius_sq {
            self.radius(lo, mid, depth + 1, qx, qy, radius_sq, found);
        }
        if diff >= 0.0 || diff * diff <= radius_sq {
            self.radius(mid + 1, hi, depth + 1, qx, qy, radius_sq, found);
        }
    }
}

/// Reorder `items` so every sub-slice has its splitting point at the middle
fn arrange(items: &mut [(usize, Point3)], depth: usize) {
    if items.len() <= 1 {
        return;
    }
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| axis(&a.1, depth).total_cmp(&axis(&b.1, depth)));
    let (left, right) = items.split_at_mut(mid);
    arrange(left, depth + 1);
    arrange(&mut right[1..], depth + 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Point3> {
        vec![
            Point3::new(2.0, 3.0, 10.0),
            Point3::new(5.0, 4.0, 20.0),
            Point3::new(9.0, 6.0, 30.0),
            Point3::new(4.0, 7.0, 40.0),
            Point3::new(8.0, 1.0, 50.0),
            Point3::new(7.0, 2.0, 60.0),
            Point3::new(1.0, 8.0, 70.0),
            Point3::new(6.0, 5.0, 80.0),
        ]
    }

    fn brute_sorted(pts: &[Point3], qx: f64, qy: f64) -> Vec<f64> {
        let mut d: Vec<f64> = pts
            .iter()
            .map(|p| (p.x - qx).powi(2) + (p.y - qy).powi(2))
            .collect();
        d.sort_by(f64::total_cmp);
        d
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
        assert!(tree.k_nearest(0.0, 0.0, 3).is_empty());
        assert!(tree.within_radius(0.0, 0.0, 10.0).is_empty());
    }

    #[test]
    fn test_nearest_keeps_input_index() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        assert_eq!(tree.len(), 8);

        let hit = tree.nearest(6.1, 5.1).unwrap();
        assert_eq!(hit.index, 7);
        assert_eq!(hit.point.z, 80.0);

        let exact = tree.nearest(5.0, 4.0).unwrap();
        assert_eq!(exact.distance_sq, 0.0);
        assert_eq!(exact.index, 1);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);
        for qx in 0..10 {
            for qy in 0..10 {
                let (qx, qy) = (qx as f64 + 0.3, qy as f64 + 0.7);
                let expected = brute_sorted(&pts, qx, qy);
                let got: Vec<f64> = tree.k_nearest(qx, qy, 3).iter().map(|r| r.distance_sq).collect();
                assert_eq!(got.len(), 3);
                for (g, e) in got.iter().zip(&expected) {
                    assert!((g - e).abs() < 1e-12, "q=({qx},{qy})");
                }
            }
        }
    }

    #[test]
    fn test_k_larger_than_tree() {
        let tree = KdTree::build(&sample_points());
        let all = tree.k_nearest(5.0, 5.0, 50);
        assert_eq!(all.len(), 8);
        assert!(all.windows(2).all(|w| w[0].distance_sq <= w[1].distance_sq));
    }

    #[test]
    fn test_within_radius_is_inclusive() {
        let pts = sample_points();
        let tree = KdTree::build(&pts);

        // (5, 4) and (6, 5) are both at exactly 1 from (5, 5)
        let hits = tree.within_radius(5.0, 5.0, 1.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].distance_sq, 1.0);

        let hits = tree.within_radius(5.0, 5.0, 3.0);
        let expected = brute_sorted(&pts, 5.0, 5.0)
            .into_iter()
            .filter(|d| *d <= 9.0)
            .count();
        assert_eq!(hits.len(), expected);
    }

    #[test]
    fn test_duplicate_coordinates() {
        let pts = vec![Point3::new(1.0, 1.0, 1.0); 5];
        let tree = KdTree::build(&pts);
        assert_eq!(tree.within_radius(1.0, 1.0, 0.0).len(), 5);
        assert_eq!(tree.k_nearest(0.0, 0.0, 2).len(), 2);
    }
}
