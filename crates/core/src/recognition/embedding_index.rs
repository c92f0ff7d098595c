use ndarray::{Array2, ArrayView1};

use crate::shared::constants::KD_TREE_MIN_ROWS;

/// Nearest-neighbor lookup over a fixed set of embeddings.
///
/// The backend is chosen once at construction: small sets use a brute-force
/// scan, larger sets a k-d tree. Both return the same nearest row index and
/// Euclidean distance for any query, modulo float tie-breaking.
pub struct EmbeddingIndex {
    data: Array2<f32>,
    strategy: Strategy,
}

enum Strategy {
    BruteForce,
    KdTree(KdTree),
}

impl EmbeddingIndex {
    pub fn new(data: Array2<f32>) -> Self {
        // A k-d tree needs at least one axis to split on.
        let strategy = if data.nrows() >= KD_TREE_MIN_ROWS && data.ncols() > 0 {
            Strategy::KdTree(KdTree::build(&data))
        } else {
            Strategy::BruteForce
        };
        Self { data, strategy }
    }

    pub fn empty() -> Self {
        Self::new(Array2::zeros((0, 0)))
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    /// Index and Euclidean distance of the nearest stored embedding, or
    /// `None` when the index is empty.
    pub fn query(&self, vector: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
        if self.is_empty() || vector.len() != self.dim() {
            return None;
        }
        let (index, dist_sq) = match &self.strategy {
            Strategy::BruteForce => brute_force_nearest(&self.data, vector)?,
            Strategy::KdTree(tree) => tree.nearest(&self.data, vector)?,
        };
        Some((index, dist_sq.sqrt()))
    }
}

fn distance_sq(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn brute_force_nearest(data: &Array2<f32>, vector: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    data.outer_iter()
        .enumerate()
        .map(|(i, row)| (i, distance_sq(row, vector)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
}

struct KdNode {
    /// Row index into the embedding matrix.
    row: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Arena-allocated k-d tree over matrix rows, cycling split axes by depth.
struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

impl KdTree {
    fn build(data: &Array2<f32>) -> Self {
        let mut rows: Vec<usize> = (0..data.nrows()).collect();
        let mut nodes = Vec::with_capacity(rows.len());
        let root = Self::build_subtree(data, &mut rows, 0, &mut nodes);
        Self { nodes, root }
    }

    fn build_subtree(
        data: &Array2<f32>,
        rows: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if rows.is_empty() {
            return None;
        }
        let axis = depth % data.ncols().max(1);
        let mid = rows.len() / 2;
        rows.select_nth_unstable_by(mid, |&a, &b| data[[a, axis]].total_cmp(&data[[b, axis]]));

        let node_pos = nodes.len();
        nodes.push(KdNode {
            row: rows[mid],
            axis,
            left: None,
            right: None,
        });
        let (left_rows, rest) = rows.split_at_mut(mid);
        let right_rows = &mut rest[1..];
        let left = Self::build_subtree(data, left_rows, depth + 1, nodes);
        let right = Self::build_subtree(data, right_rows, depth + 1, nodes);
        nodes[node_pos].left = left;
        nodes[node_pos].right = right;
        Some(node_pos)
    }

    fn nearest(&self, data: &Array2<f32>, vector: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        if let Some(root) = self.root {
            self.search(root, data, vector, &mut best);
        }
        best
    }

    fn search(
        &self,
        node_pos: usize,
        data: &Array2<f32>,
        vector: ArrayView1<'_, f32>,
        best: &mut Option<(usize, f32)>,
    ) {
        let node = &self.nodes[node_pos];
        let d = distance_sq(data.row(node.row), vector);
        if best.map_or(true, |(_, b)| d < b) {
            *best = Some((node.row, d));
        }

        let diff = vector[node.axis] - data[[node.row, node.axis]];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(n) = near {
            self.search(n, data, vector, best);
        }
        // The far branch can only win if the splitting plane is closer than
        // the current best.
        if let Some(f) = far {
            if best.map_or(true, |(_, b)| diff * diff < b) {
                self.search(f, data, vector, best);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    /// Deterministic pseudo-random matrix, enough rows to force the k-d tree.
    fn pseudo_random_matrix(rows: usize, cols: usize) -> Array2<f32> {
        let mut state: u32 = 0x2545_f491;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 1000) as f32 / 1000.0
        };
        Array2::from_shape_fn((rows, cols), |_| next())
    }

    #[test]
    fn test_empty_index_returns_none() {
        let index = EmbeddingIndex::empty();
        assert!(index.is_empty());
        let q: Array1<f32> = array![1.0, 2.0];
        assert!(index.query(q.view()).is_none());
    }

    #[test]
    fn test_brute_force_nearest_row() {
        let index = EmbeddingIndex::new(array![[0.0, 0.0], [1.0, 0.0], [0.0, 3.0]]);
        let q: Array1<f32> = array![0.9, 0.1];
        let (row, dist) = index.query(q.view()).unwrap();
        assert_eq!(row, 1);
        assert_relative_eq!(dist, (0.01f32 + 0.01).sqrt(), max_relative = 1e-5);
    }

    #[test]
    fn test_self_query_has_zero_distance() {
        let data = pseudo_random_matrix(10, 8);
        let index = EmbeddingIndex::new(data.clone());
        for i in 0..data.nrows() {
            let (row, dist) = index.query(data.row(i)).unwrap();
            assert_relative_eq!(dist, 0.0);
            // Exact duplicates may resolve to another row at distance 0.
            assert_relative_eq!(distance_sq(data.row(row), data.row(i)), 0.0);
        }
    }

    #[test]
    fn test_dimension_mismatch_returns_none() {
        let index = EmbeddingIndex::new(array![[0.0, 0.0], [1.0, 0.0]]);
        let q: Array1<f32> = array![1.0, 2.0, 3.0];
        assert!(index.query(q.view()).is_none());
    }

    #[test]
    fn test_large_set_uses_kd_tree() {
        let data = pseudo_random_matrix(KD_TREE_MIN_ROWS, 4);
        let index = EmbeddingIndex::new(data);
        assert!(matches!(index.strategy, Strategy::KdTree(_)));
    }

    #[test]
    fn test_zero_column_set_stays_brute_force() {
        // Enough rows for the k-d tree, but nothing to split on.
        let data = Array2::<f32>::zeros((KD_TREE_MIN_ROWS * 2, 0));
        let index = EmbeddingIndex::new(data);
        assert!(matches!(index.strategy, Strategy::BruteForce));
        let q = Array1::<f32>::zeros(0);
        let (_, dist) = index.query(q.view()).unwrap();
        assert_relative_eq!(dist, 0.0);
    }

    #[test]
    fn test_kd_tree_matches_brute_force() {
        let data = pseudo_random_matrix(64, 6);
        let tree_index = EmbeddingIndex::new(data.clone());
        let queries = pseudo_random_matrix(40, 6);

        for q in queries.outer_iter() {
            let (brute_row, brute_d) = brute_force_nearest(&data, q).unwrap();
            let (tree_row, tree_d) = tree_index.query(q).unwrap();
            assert_relative_eq!(tree_d, brute_d.sqrt(), max_relative = 1e-5);
            // Rows may differ only on exact distance ties.
            if tree_row != brute_row {
                assert_relative_eq!(
                    distance_sq(data.row(tree_row), q),
                    distance_sq(data.row(brute_row), q),
                    max_relative = 1e-5
                );
            }
        }
    }

    #[test]
    fn test_kd_tree_self_queries() {
        let data = pseudo_random_matrix(128, 16);
        let index = EmbeddingIndex::new(data.clone());
        for i in (0..data.nrows()).step_by(7) {
            let (_, dist) = index.query(data.row(i)).unwrap();
            assert_relative_eq!(dist, 0.0);
        }
    }
}
