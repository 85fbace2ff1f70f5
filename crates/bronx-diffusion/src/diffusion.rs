// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph Diffusion Operator
// ─────────────────────────────────────────────────────────────────────
//! Graph → row-normalised adjacency → Φ = exp(D⁻¹A − I).
//!
//! Φ is a closed-form multi-hop smoother. Isolated nodes keep an all-zero
//! adjacency row, so their row of Φ is `e⁻¹` on the diagonal and zero
//! elsewhere: they diffuse no mass.

use std::sync::Arc;

use bronx_types::{BronxResult, Matrix};

use crate::cache::{CacheStats, LruCache};
use crate::expm::matrix_exp;
use crate::graph::Graph;

/// Row-stochastic normalisation `D⁻¹A` with `d_i = max(1, Σ_j A[i,j])`.
///
/// Rows of positive-degree nodes sum to exactly 1; isolated rows stay 0.
pub fn normalised_adjacency(graph: &Graph) -> Matrix {
    let mut a = graph.adjacency();
    let n = graph.num_nodes();
    for i in 0..n {
        let row = a.row_mut(i);
        let d: f64 = row.iter().sum::<f64>().max(1.0);
        for v in row.iter_mut() {
            *v /= d;
        }
    }
    a
}

/// Generator `D⁻¹A − I` whose exponential is the diffusion operator.
pub fn diffusion_generator(graph: &Graph) -> Matrix {
    let mut l = normalised_adjacency(graph);
    l.add_diagonal(-1.0);
    l
}

/// Uncached diffusion operator `Φ = exp(D⁻¹A − I)`.
pub fn diffusion_operator(graph: &Graph) -> BronxResult<Matrix> {
    matrix_exp(&diffusion_generator(graph))
}

/// Cache entry key: content fingerprint plus node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OperatorKey {
    fingerprint: u64,
    num_nodes: usize,
}

impl OperatorKey {
    fn of(graph: &Graph) -> Self {
        Self {
            fingerprint: graph.fingerprint(),
            num_nodes: graph.num_nodes(),
        }
    }
}

/// Diffusion operator component with an explicit LRU cache.
///
/// Operators are keyed by the graph's content fingerprint, so an
/// unchanged graph always gets the same shared `Arc<Matrix>` back and a
/// mutated graph is recomputed. Capacity defaults to one operator.
pub struct GraphDiffusion {
    cache: LruCache<OperatorKey, Arc<Matrix>>,
}

impl Default for GraphDiffusion {
    fn default() -> Self {
        Self::new(1)
    }
}

impl GraphDiffusion {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Φ for `graph`, computed on first use and shared afterwards.
    pub fn operator(&self, graph: &Graph) -> BronxResult<Arc<Matrix>> {
        let key = OperatorKey::of(graph);
        self.cache.get_or_try_insert_with(key, || {
            log::debug!(
                "building diffusion operator: {} nodes, {} edges",
                graph.num_nodes(),
                graph.num_edges()
            );
            diffusion_operator(graph).map(Arc::new)
        })
    }

    /// Drop the cached operator for `graph`, if any.
    pub fn invalidate(&self, graph: &Graph) -> bool {
        self.cache.remove(&OperatorKey::of(graph)).is_some()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
