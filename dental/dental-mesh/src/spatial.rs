//! KD-tree nearest-neighbor and radius queries over vertex positions.

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Spatial index over a fixed set of points.
///
/// Items are the positions' indices in the slice the index was built from.
/// The index does not track later changes to those positions; rebuild it
/// after any mutation.
///
/// The tree is built in one pass, so any number of points may share a
/// coordinate on an axis (flat scan bases, planar cuts, quantized input).
#[derive(Clone)]
pub struct SpatialIndex {
    tree: Option<ImmutableKdTree<f64, 3>>,
    len: usize,
}

impl SpatialIndex {
    /// Build an index over `points`.
    #[must_use]
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let coords: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
        let tree = (!coords.is_empty()).then(|| ImmutableKdTree::new_from_slice(&coords));
        Self {
            tree,
            len: points.len(),
        }
    }

    /// Number of indexed points.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no points.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `k` nearest points to `query` as `(index, distance)` pairs,
    /// nearest first. Distances are Euclidean.
    #[must_use]
    pub fn nearest(&self, query: &Point3<f64>, k: usize) -> Vec<(usize, f64)> {
        let Some(tree) = self.tree.as_ref().filter(|_| k > 0) else {
            return Vec::new();
        };
        tree.nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], k.min(self.len))
            .into_iter()
            .map(|n| (n.item as usize, n.distance.sqrt()))
            .collect()
    }

    /// The single nearest point to `query`.
    #[must_use]
    pub fn nearest_one(&self, query: &Point3<f64>) -> Option<(usize, f64)> {
        let tree = self.tree.as_ref()?;
        let n = tree.nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        Some((n.item as usize, n.distance.sqrt()))
    }

    /// All points within `radius` of `query`, nearest first.
    #[must_use]
    pub fn within(&self, query: &Point3<f64>, radius: f64) -> Vec<(usize, f64)> {
        let Some(tree) = self.tree.as_ref() else {
            return Vec::new();
        };
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        tree.within::<SquaredEuclidean>(&[query.x, query.y, query.z], radius * radius)
            .into_iter()
            .map(|n| (n.item as usize, n.distance.sqrt()))
            .collect()
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scattered_points() -> Vec<Point3<f64>> {
        (0..50)
            .map(|i| {
                let t = f64::from(i);
                Point3::new(t * 0.1, t * 0.013, t * 0.007)
            })
            .collect()
    }

    #[test]
    fn nearest_returns_exact_match_first() {
        let points = scattered_points();
        let index = SpatialIndex::from_points(&points);
        let hits = index.nearest(&points[17], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 17);
        assert_relative_eq!(hits[0].1, 0.0, epsilon = 1e-12);
        assert!(hits[1].1 <= hits[2].1);
    }

    #[test]
    fn nearest_one_snaps_to_closest() {
        let points = scattered_points();
        let index = SpatialIndex::from_points(&points);
        let query = points[5] + nalgebra::Vector3::new(0.01, 0.0, 0.0);
        let (idx, dist) = index.nearest_one(&query).unwrap_or((usize::MAX, 0.0));
        assert_eq!(idx, 5);
        assert_relative_eq!(dist, 0.01, epsilon = 1e-9);
    }

    #[test]
    fn within_radius() {
        let points = scattered_points();
        let index = SpatialIndex::from_points(&points);
        let step = (points[1] - points[0]).norm();
        let hits = index.within(&points[10], step * 1.5);
        let mut ids: Vec<usize> = hits.iter().map(|h| h.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![9, 10, 11]);
    }

    #[test]
    fn empty_index_answers_nothing() {
        let index = SpatialIndex::from_points(&[]);
        assert!(index.is_empty());
        assert!(index.nearest(&Point3::origin(), 4).is_empty());
        assert!(index.nearest_one(&Point3::origin()).is_none());
        assert!(index.within(&Point3::origin(), 10.0).is_empty());
    }

    #[test]
    fn k_larger_than_point_count_is_clamped() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0)];
        let index = SpatialIndex::from_points(&points);
        assert_eq!(index.nearest(&Point3::origin(), 10).len(), 2);
    }

    /// Exact `n x n` grid in the XY plane: every point shares z = 0
    /// and each x or y value is shared by a whole row or column.
    fn flat_grid(n: u32) -> Vec<Point3<f64>> {
        (0..n)
            .flat_map(|j| (0..n).map(move |i| Point3::new(f64::from(i), f64::from(j), 0.0)))
            .collect()
    }

    #[test]
    fn flat_grid_builds_and_answers() {
        let points = flat_grid(12);
        let index = SpatialIndex::from_points(&points);
        assert_eq!(index.len(), 144);

        let hits = index.nearest(&Point3::new(5.0, 5.0, 0.0), 5);
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].0, 5 * 12 + 5);
        assert_relative_eq!(hits[0].1, 0.0);
        for h in &hits[1..] {
            assert_relative_eq!(h.1, 1.0, epsilon = 1e-12);
        }

        let (idx, _) = index
            .nearest_one(&Point3::new(10.9, 3.1, 0.2))
            .unwrap_or((usize::MAX, 0.0));
        assert_eq!(idx, 3 * 12 + 11);

        let mut ring: Vec<usize> = index
            .within(&Point3::new(0.0, 0.0, 0.0), 1.01)
            .iter()
            .map(|h| h.0)
            .collect();
        ring.sort_unstable();
        assert_eq!(ring, vec![0, 1, 12]);
    }
}
