// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph Structure
// ─────────────────────────────────────────────────────────────────────
//! Directed graph over `N` nodes stored as two parallel index lists.
//!
//! The fingerprint is a content hash of the node count and the sorted,
//! de-duplicated edge set. It is the cache key for every derived
//! operator, so two graphs with the same edge set share cache entries
//! and any mutation moves the graph to a fresh key.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bronx_types::{BronxError, BronxResult, Matrix};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    num_nodes: usize,
    src: Vec<usize>,
    dst: Vec<usize>,
    fingerprint: u64,
}

impl Graph {
    /// Build a graph from parallel `src`/`dst` index lists.
    pub fn new(num_nodes: usize, src: Vec<usize>, dst: Vec<usize>) -> BronxResult<Self> {
        if num_nodes == 0 {
            return Err(BronxError::Graph("graph must have at least one node".into()));
        }
        if src.len() != dst.len() {
            return Err(BronxError::Graph(format!(
                "edge lists differ in length: {} sources, {} destinations",
                src.len(),
                dst.len()
            )));
        }
        if let Some(&bad) = src.iter().chain(dst.iter()).find(|&&v| v >= num_nodes) {
            return Err(BronxError::IndexOutOfRange {
                index: bad,
                len: num_nodes,
            });
        }
        let mut graph = Self {
            num_nodes,
            src,
            dst,
            fingerprint: 0,
        };
        graph.refresh_fingerprint();
        Ok(graph)
    }

    /// Graph with no edges.
    pub fn edgeless(num_nodes: usize) -> BronxResult<Self> {
        Self::new(num_nodes, Vec::new(), Vec::new())
    }

    /// Build a graph emitting both `(a, b)` and `(b, a)` for every pair.
    pub fn undirected(num_nodes: usize, pairs: &[(usize, usize)]) -> BronxResult<Self> {
        let mut src = Vec::with_capacity(pairs.len() * 2);
        let mut dst = Vec::with_capacity(pairs.len() * 2);
        for &(a, b) in pairs {
            src.push(a);
            dst.push(b);
            src.push(b);
            dst.push(a);
        }
        Self::new(num_nodes, src, dst)
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Edge list as two parallel index slices.
    pub fn edges(&self) -> (&[usize], &[usize]) {
        (&self.src, &self.dst)
    }

    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn add_edge(&mut self, src: usize, dst: usize) -> BronxResult<()> {
        for v in [src, dst] {
            if v >= self.num_nodes {
                return Err(BronxError::IndexOutOfRange {
                    index: v,
                    len: self.num_nodes,
                });
            }
        }
        self.src.push(src);
        self.dst.push(dst);
        self.refresh_fingerprint();
        Ok(())
    }

    pub fn remove_self_loops(&mut self) {
        let (src, dst): (Vec<usize>, Vec<usize>) = self
            .src
            .iter()
            .zip(&self.dst)
            .filter(|(s, d)| s != d)
            .map(|(&s, &d)| (s, d))
            .unzip();
        self.src = src;
        self.dst = dst;
        self.refresh_fingerprint();
    }

    /// Remove existing self-loops, then add exactly one per node.
    pub fn add_self_loops(&mut self) {
        self.remove_self_loops();
        for v in 0..self.num_nodes {
            self.src.push(v);
            self.dst.push(v);
        }
        self.refresh_fingerprint();
    }

    /// Dense adjacency with `A[src, dst] = 1`. Duplicate edges collapse.
    pub fn adjacency(&self) -> Matrix {
        let mut a = Matrix::zeros(self.num_nodes, self.num_nodes);
        for (&s, &d) in self.src.iter().zip(&self.dst) {
            a[(s, d)] = 1.0;
        }
        a
    }

    /// Out-degree counted over distinct destinations.
    pub fn degrees(&self) -> Vec<usize> {
        let a = self.adjacency();
        (0..self.num_nodes)
            .map(|i| a.row(i).iter().filter(|&&v| v != 0.0).count())
            .collect()
    }

    fn refresh_fingerprint(&mut self) {
        let mut edges: Vec<(usize, usize)> = self
            .src
            .iter()
            .copied()
            .zip(self.dst.iter().copied())
            .collect();
        edges.sort_unstable();
        edges.dedup();

        let mut hasher = DefaultHasher::new();
        self.num_nodes.hash(&mut hasher);
        edges.hash(&mut hasher);
        self.fingerprint = hasher.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(n: usize) -> Graph {
        let pairs: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        Graph::undirected(n, &pairs).unwrap()
    }

    #[test]
    fn test_rejects_empty_graph() {
        assert!(matches!(Graph::edgeless(0), Err(BronxError::Graph(_))));
    }

    #[test]
    fn test_rejects_mismatched_edge_lists() {
        assert!(matches!(
            Graph::new(3, vec![0, 1], vec![1]),
            Err(BronxError::Graph(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_node() {
        assert_eq!(
            Graph::new(3, vec![0], vec![3]),
            Err(BronxError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_undirected_emits_both_directions() {
        let g = ring(4);
        assert_eq!(g.num_edges(), 8);
        let a = g.adjacency();
        assert!(a.is_symmetric(0.0));
        assert_eq!(g.degrees(), vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let g = Graph::new(2, vec![0, 0, 0], vec![1, 1, 1]).unwrap();
        assert_eq!(g.adjacency()[(0, 1)], 1.0);
        assert_eq!(g.degrees(), vec![1, 0]);
    }

    #[test]
    fn test_fingerprint_ignores_order_and_multiplicity() {
        let a = Graph::new(3, vec![0, 1, 2], vec![1, 2, 0]).unwrap();
        let b = Graph::new(3, vec![2, 0, 1, 0], vec![0, 1, 2, 1]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_node_count() {
        let a = Graph::edgeless(3).unwrap();
        let b = Graph::edgeless(4).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_mutation_changes_fingerprint() {
        let mut g = ring(4);
        let before = g.fingerprint();
        g.add_edge(0, 2).unwrap();
        assert_ne!(g.fingerprint(), before);
        assert!(g.add_edge(0, 9).is_err());
    }

    #[test]
    fn test_self_loop_handling() {
        let mut g = Graph::new(3, vec![0, 1, 1], vec![0, 2, 1]).unwrap();
        g.remove_self_loops();
        assert_eq!(g.edges(), (&[1usize][..], &[2usize][..]));
        g.add_self_loops();
        assert_eq!(g.num_edges(), 4);
        assert_eq!(g.adjacency().diag(), vec![1.0, 1.0, 1.0]);
    }
}
