//! k-d tree over points of any fixed dimension
//!
//! Backs every neighbour search in the matcher: unit-sphere embeddings for
//! great-circle matching, whitened covariates for Mahalanobis matching and
//! projected coordinates for placebo disks.
//!
//! Results are ordered by `(distance, index)`, so equidistant candidates
//! always resolve to the lowest index and queries are reproducible.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;

use ndarray::ArrayView2;

/// A k-d tree storing its points row-major in a flat buffer.
#[derive(Debug, Clone)]
pub struct KdTree {
    dim: usize,
    coords: Vec<f64>,
    nodes: Vec<KdNode>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index of the point in the input order
    point_idx: usize,
    split_dim: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// One neighbour returned by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row of the point in the array the tree was built from
    pub index: usize,
    /// Squared Euclidean distance to the query
    pub distance_sq: f64,
}

impl Neighbor {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }

    fn cmp_key(&self, other: &Neighbor) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl KdTree {
    /// Build a tree from an `(n_points, dim)` array.
    ///
    /// Coordinates must be finite; callers validate their inputs first.
    pub fn build(points: ArrayView2<'_, f64>) -> Self {
        let (n, dim) = points.dim();
        let coords: Vec<f64> = points.iter().copied().collect();
        let mut nodes = Vec::with_capacity(n);

        if n > 0 && dim > 0 {
            let mut indices: Vec<usize> = (0..n).collect();
            build_recursive(&coords, dim, &mut indices, 0, &mut nodes);
        }

        Self { dim, coords, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Coordinates of the point stored at `index`
    pub fn point(&self, index: usize) -> &[f64] {
        &self.coords[index * self.dim..(index + 1) * self.dim]
    }

    /// The single nearest point, or `None` on an empty tree
    pub fn nearest(&self, query: &[f64]) -> Option<Neighbor> {
        self.k_nearest(query, 1).into_iter().next()
    }

    /// The `k` nearest points, ascending by `(distance, index)`.
    ///
    /// Returns fewer than `k` results only when the tree holds fewer points.
    pub fn k_nearest(&self, query: &[f64], k: usize) -> Vec<Neighbor> {
        debug_assert_eq!(query.len(), self.dim);
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        // Kept sorted ascending; the last element is the current k-th best.
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, query, k, &mut best);
        best
    }

    /// All points within `radius` (inclusive), ascending by `(distance, index)`.
    ///
    /// A zero radius still returns points at exactly the query location;
    /// a negative radius returns nothing.
    pub fn within_radius(&self, query: &[f64], radius: f64) -> Vec<Neighbor> {
        debug_assert_eq!(query.len(), self.dim);
        if self.nodes.is_empty() || radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }

        let mut results = Vec::new();
        self.radius_recursive(0, query, radius * radius, &mut results);
        results.sort_by(Neighbor::cmp_key);
        results
    }

    fn distance_sq(&self, point_idx: usize, query: &[f64]) -> f64 {
        self.point(point_idx)
            .iter()
            .zip(query)
            .map(|(p, q)| (q - p) * (q - p))
            .sum()
    }

    fn knn_recursive(&self, node_idx: usize, query: &[f64], k: usize, best: &mut Vec<Neighbor>) {
        let node = &self.nodes[node_idx];
        let candidate = Neighbor {
            index: node.point_idx,
            distance_sq: self.distance_sq(node.point_idx, query),
        };

        let accept = best.len() < k
            || best
                .last()
                .is_some_and(|worst| candidate.cmp_key(worst) == Ordering::Less);
        if accept {
            let pos = best.partition_point(|n| n.cmp_key(&candidate) == Ordering::Less);
            best.insert(pos, candidate);
            best.truncate(k);
        }

        let diff = query[node.split_dim] - self.point(node.point_idx)[node.split_dim];
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, query, k, best);
        }

        // `<=` so that a tie at the k-th distance can still be displaced by a
        // lower index on the far side.
        let threshold = if best.len() < k {
            f64::INFINITY
        } else {
            best.last().map_or(f64::INFINITY, |n| n.distance_sq)
        };
        if diff * diff <= threshold
            && let Some(child) = second
        {
            self.knn_recursive(child, query, k, best);
        }
    }

    fn radius_recursive(
        &self,
        node_idx: usize,
        query: &[f64],
        radius_sq: f64,
        results: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let distance_sq = self.distance_sq(node.point_idx, query);
        if distance_sq <= radius_sq {
            results.push(Neighbor {
                index: node.point_idx,
                distance_sq,
            });
        }

        let diff = query[node.split_dim] - self.point(node.point_idx)[node.split_dim];

        if let Some(left) = node.left
            && (diff <= 0.0 || diff * diff <= radius_sq)
        {
            self.radius_recursive(left, query, radius_sq, results);
        }
        if let Some(right) = node.right
            && (diff >= 0.0 || diff * diff <= radius_sq)
        {
            self.radius_recursive(right, query, radius_sq, results);
        }
    }
}

/// Median split on `depth % dim`; returns the index of the created node.
fn build_recursive(
    coords: &[f64],
    dim: usize,
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let split_dim = depth % dim;
    let median = indices.len() / 2;
    indices.select_nth_unstable_by(median, |&a, &b| {
        coords[a * dim + split_dim].total_cmp(&coords[b * dim + split_dim])
    });

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (lower, rest) = indices.split_at_mut(median);
    let upper = &mut rest[1..];

    if !lower.is_empty() {
        let left = build_recursive(coords, dim, lower, depth + 1, nodes);
        nodes[node_idx].left = Some(left);
    }
    if !upper.is_empty() {
        let right = build_recursive(coords, dim, upper, depth + 1, nodes);
        nodes[node_idx].right = Some(right);
    }

    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn sample_points() -> Array2<f64> {
        array![
            [2.0, 3.0],
            [5.0, 4.0],
            [9.0, 6.0],
            [4.0, 7.0],
            [8.0, 1.0],
            [7.0, 2.0],
            [1.0, 8.0],
            [6.0, 5.0],
        ]
    }

    fn scattered(n: usize, dim: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, dim), |(i, d)| ((i * (7 + 4 * d) + 13 * d + 5) % 97) as f64)
    }

    fn brute_force(points: &Array2<f64>, q: &[f64]) -> Vec<Neighbor> {
        let mut all: Vec<Neighbor> = points
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                index,
                distance_sq: row.iter().zip(q).map(|(a, b)| (a - b) * (a - b)).sum(),
            })
            .collect();
        all.sort_by(Neighbor::cmp_key);
        all
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(Array2::<f64>::zeros((0, 2)).view());
        assert!(tree.is_empty());
        assert!(tree.nearest(&[0.0, 0.0]).is_none());
        assert!(tree.k_nearest(&[0.0, 0.0], 3).is_empty());
        assert!(tree.within_radius(&[0.0, 0.0], 10.0).is_empty());
    }

    #[test]
    fn test_nearest_exact() {
        let pts = sample_points();
        let tree = KdTree::build(pts.view());
        let result = tree.nearest(&[5.0, 4.0]).unwrap();
        assert_eq!(result.index, 1);
        assert!(result.distance_sq < 1e-10);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        for dim in 1..=4 {
            let pts = scattered(300, dim);
            let tree = KdTree::build(pts.view());
            for q in 0..25 {
                let query: Vec<f64> = (0..dim).map(|d| (q * 3 + d * 11) as f64 + 0.25).collect();
                let expected = brute_force(&pts, &query);
                let got = tree.k_nearest(&query, 10);
                assert_eq!(got.len(), 10);
                for (g, e) in got.iter().zip(&expected) {
                    assert_eq!(g.index, e.index, "dim {} query {:?}", dim, query);
                    assert!((g.distance_sq - e.distance_sq).abs() < 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        // Four points equidistant from the origin, plus duplicates
        let pts = array![[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [1.0, 0.0]];
        let tree = KdTree::build(pts.view());
        let got: Vec<usize> = tree.k_nearest(&[0.0, 0.0], 3).iter().map(|n| n.index).collect();
        assert_eq!(got, vec![0, 1, 2]);
        assert_eq!(tree.nearest(&[1.0, 0.0]).unwrap().index, 0);
    }

    #[test]
    fn test_k_nearest_more_than_points() {
        let pts = sample_points();
        let tree = KdTree::build(pts.view());
        let results = tree.k_nearest(&[5.0, 5.0], 100);
        assert_eq!(results.len(), pts.nrows());
        for w in results.windows(2) {
            assert!(w[0].distance_sq <= w[1].distance_sq);
        }
    }

    #[test]
    fn test_within_radius() {
        let pts = sample_points();
        let tree = KdTree::build(pts.view());
        let results = tree.within_radius(&[5.0, 5.0], 2.0);
        let bf: Vec<usize> = brute_force(&pts, &[5.0, 5.0])
            .into_iter()
            .filter(|n| n.distance_sq <= 4.0)
            .map(|n| n.index)
            .collect();
        assert_eq!(results.iter().map(|n| n.index).collect::<Vec<_>>(), bf);
    }

    #[test]
    fn test_within_radius_zero_keeps_exact_hits() {
        let pts = sample_points();
        let tree = KdTree::build(pts.view());
        assert!(tree.within_radius(&[5.5, 5.0], 0.0).is_empty());
        let hit = tree.within_radius(&[6.0, 5.0], 0.0);
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].index, 7);
        assert!(tree.within_radius(&[6.0, 5.0], -1.0).is_empty());
    }

    #[test]
    fn test_three_dimensions() {
        let pts = array![[0.0, 0.0, 0.0], [0.0, 0.0, 5.0], [3.0, 4.0, 0.0]];
        let tree = KdTree::build(pts.view());
        assert_eq!(tree.dim(), 3);
        let n = tree.k_nearest(&[0.0, 0.0, 4.0], 2);
        assert_eq!(n[0].index, 1);
        assert_eq!(n[1].index, 0);
        assert!((n[1].distance() - 4.0).abs() < 1e-12);
        assert_eq!(tree.point(2), &[3.0, 4.0, 0.0]);
    }
}
