// ─────────────────────────────────────────────────────────────────────
// Bronx — Covariance Kernels
// Mirrors: bronx/kernels.py
// ─────────────────────────────────────────────────────────────────────
//! Kernel capability and its variants.
//!
//! A kernel maps a pair of node sets to a covariance. Node sets carry
//! whatever a kernel may need (graph, node indices, feature rows) and
//! each kernel checks for the pieces it uses:
//!   - `DiffusionKernel`: graph + indices, slices Φ[X, :][:, Z]
//!   - `RbfKernel` / `LinearKernel`: feature rows
//!   - `CompositeKernel`: diffusion term ⊙ optional feature kernel

use std::sync::Arc;

use bronx_diffusion::{Graph, GraphDiffusion, LruCache};
use bronx_types::{BronxError, BronxResult, Matrix};

/// A set of nodes presented to a kernel.
///
/// When both `indices` and `features` are present, feature row `k`
/// belongs to node `indices[k]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelInput<'a> {
    pub graph: Option<&'a Graph>,
    pub indices: Option<&'a [usize]>,
    pub features: Option<&'a Matrix>,
}

impl<'a> KernelInput<'a> {
    /// Feature rows only.
    pub fn features(features: &'a Matrix) -> Self {
        Self {
            features: Some(features),
            ..Default::default()
        }
    }

    /// Node indices on a graph.
    pub fn nodes(graph: &'a Graph, indices: &'a [usize]) -> Self {
        Self {
            graph: Some(graph),
            indices: Some(indices),
            features: None,
        }
    }

    pub fn with_features(mut self, features: &'a Matrix) -> Self {
        self.features = Some(features);
        self
    }

    fn require_graph(&self) -> BronxResult<&'a Graph> {
        self.graph.ok_or(BronxError::MissingArgument("graph"))
    }

    fn require_indices(&self) -> BronxResult<&'a [usize]> {
        self.indices.ok_or(BronxError::MissingArgument("indices"))
    }

    fn require_features(&self) -> BronxResult<&'a Matrix> {
        self.features.ok_or(BronxError::MissingArgument("features"))
    }
}

/// Kernel output: a full covariance block or its diagonal.
#[derive(Debug, Clone, PartialEq)]
pub enum Covariance {
    Full(Matrix),
    Diag(Vec<f64>),
}

impl Covariance {
    /// Element-wise product of two covariances of the same kind and shape.
    pub fn hadamard(&self, other: &Covariance) -> BronxResult<Covariance> {
        match (self, other) {
            (Covariance::Full(a), Covariance::Full(b)) => Ok(Covariance::Full(a.hadamard(b)?)),
            (Covariance::Diag(a), Covariance::Diag(b)) => {
                if a.len() != b.len() {
                    return Err(BronxError::Shape(format!(
                        "diagonal product of lengths {} and {}",
                        a.len(),
                        b.len()
                    )));
                }
                Ok(Covariance::Diag(
                    a.iter().zip(b).map(|(x, y)| x * y).collect(),
                ))
            }
            _ => Err(BronxError::Shape(
                "cannot combine a full covariance with a diagonal one".into(),
            )),
        }
    }

    pub fn into_matrix(self) -> Matrix {
        match self {
            Covariance::Full(m) => m,
            Covariance::Diag(d) => Matrix::from_diag(&d),
        }
    }

    pub fn into_diag(self) -> Vec<f64> {
        match self {
            Covariance::Full(m) => m.diag(),
            Covariance::Diag(d) => d,
        }
    }
}

/// Covariance function over node sets.
pub trait Kernel: Send + Sync {
    /// Evaluate `k(x, z)`; `z = None` means `z = x`. With `diag` only the
    /// pointwise self-covariance of `x` is returned and `z` is ignored.
    fn evaluate(
        &self,
        x: &KernelInput<'_>,
        z: Option<&KernelInput<'_>>,
        diag: bool,
    ) -> BronxResult<Covariance>;

    fn matrix(&self, x: &KernelInput<'_>, z: Option<&KernelInput<'_>>) -> BronxResult<Matrix> {
        Ok(self.evaluate(x, z, false)?.into_matrix())
    }

    fn diag(&self, x: &KernelInput<'_>) -> BronxResult<Vec<f64>> {
        Ok(self.evaluate(x, None, true)?.into_diag())
    }
}

// ─── Diffusion kernel ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct SliceKey {
    fingerprint: u64,
    num_nodes: usize,
    x: Vec<usize>,
    z: Vec<usize>,
    diag: bool,
}

/// Graph diffusion covariance `k(i, j) = Φ[i, j]`.
///
/// Evaluations are memoised by value in a bounded LRU keyed by
/// `(graph fingerprint, X, Z, diag)`. Results are handed out as shared
/// `Arc`s and are read-only.
pub struct DiffusionKernel {
    diffusion: Arc<GraphDiffusion>,
    cache: LruCache<SliceKey, Arc<Covariance>>,
}

impl DiffusionKernel {
    pub fn new(diffusion: Arc<GraphDiffusion>, cache_capacity: usize) -> Self {
        Self {
            diffusion,
            cache: LruCache::new(cache_capacity),
        }
    }

    pub fn diffusion(&self) -> &Arc<GraphDiffusion> {
        &self.diffusion
    }

    /// `Φ[x_idx, :][:, z_idx]`, or its diagonal when `diag` is set.
    pub fn variance(
        &self,
        graph: &Graph,
        x_idx: &[usize],
        z_idx: Option<&[usize]>,
        diag: bool,
    ) -> BronxResult<Arc<Covariance>> {
        let z_idx = if diag { x_idx } else { z_idx.unwrap_or(x_idx) };
        let key = SliceKey {
            fingerprint: graph.fingerprint(),
            num_nodes: graph.num_nodes(),
            x: x_idx.to_vec(),
            z: z_idx.to_vec(),
            diag,
        };
        self.cache.get_or_try_insert_with(key, || {
            let phi = self.diffusion.operator(graph)?;
            let cov = if diag {
                let n = phi.rows();
                let mut d = Vec::with_capacity(x_idx.len());
                for &i in x_idx {
                    if i >= n {
                        return Err(BronxError::IndexOutOfRange { index: i, len: n });
                    }
                    d.push(phi[(i, i)]);
                }
                Covariance::Diag(d)
            } else {
                Covariance::Full(phi.select_rows(x_idx)?.select_cols(z_idx)?)
            };
            Ok(Arc::new(cov))
        })
    }

    /// Drop every memoised slice belonging to `graph`.
    pub fn invalidate(&self, graph: &Graph) -> usize {
        let fp = graph.fingerprint();
        self.cache.retain_keys(|k| k.fingerprint != fp)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Kernel for DiffusionKernel {
    fn evaluate(
        &self,
        x: &KernelInput<'_>,
        z: Option<&KernelInput<'_>>,
        diag: bool,
    ) -> BronxResult<Covariance> {
        let graph = x.require_graph()?;
        let x_idx = x.require_indices()?;
        let z_idx = match z {
            Some(z) => Some(z.require_indices()?),
            None => None,
        };
        let shared = self.variance(graph, x_idx, z_idx, diag)?;
        Ok((*shared).clone())
    }
}

// ─── Feature kernels ────────────────────────────────────────────────

fn check_positive(name: &str, value: f64) -> BronxResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(BronxError::Config(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

fn feature_pair<'a>(
    x: &KernelInput<'a>,
    z: Option<&KernelInput<'a>>,
) -> BronxResult<(&'a Matrix, &'a Matrix)> {
    let fx = x.require_features()?;
    let fz = match z {
        Some(z) => z.require_features()?,
        None => fx,
    };
    if fx.cols() != fz.cols() {
        return Err(BronxError::Shape(format!(
            "feature widths differ: {} vs {}",
            fx.cols(),
            fz.cols()
        )));
    }
    Ok((fx, fz))
}

/// Squared-exponential kernel `σ² exp(-‖x - z‖² / (2ℓ²))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RbfKernel {
    variance: f64,
    lengthscale: f64,
}

impl RbfKernel {
    pub fn new(variance: f64, lengthscale: f64) -> BronxResult<Self> {
        check_positive("variance", variance)?;
        check_positive("lengthscale", lengthscale)?;
        Ok(Self {
            variance,
            lengthscale,
        })
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn lengthscale(&self) -> f64 {
        self.lengthscale
    }
}

impl Default for RbfKernel {
    fn default() -> Self {
        Self {
            variance: 1.0,
            lengthscale: 1.0,
        }
    }
}

impl Kernel for RbfKernel {
    fn evaluate(
        &self,
        x: &KernelInput<'_>,
        z: Option<&KernelInput<'_>>,
        diag: bool,
    ) -> BronxResult<Covariance> {
        if diag {
            let fx = x.require_features()?;
            return Ok(Covariance::Diag(vec![self.variance; fx.rows()]));
        }
        let (fx, fz) = feature_pair(x, z)?;
        let two_l2 = 2.0 * self.lengthscale * self.lengthscale;
        let k = Matrix::from_fn(fx.rows(), fz.rows(), |i, j| {
            let dist2: f64 = fx
                .row(i)
                .iter()
                .zip(fz.row(j))
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            self.variance * (-dist2 / two_l2).exp()
        });
        Ok(Covariance::Full(k))
    }
}

/// Dot-product kernel `σ² ⟨x, z⟩`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearKernel {
    variance: f64,
}

impl LinearKernel {
    pub fn new(variance: f64) -> BronxResult<Self> {
        check_positive("variance", variance)?;
        Ok(Self { variance })
    }
}

impl Kernel for LinearKernel {
    fn evaluate(
        &self,
        x: &KernelInput<'_>,
        z: Option<&KernelInput<'_>>,
        diag: bool,
    ) -> BronxResult<Covariance> {
        let (fx, fz) = feature_pair(x, if diag { None } else { z })?;
        if diag {
            let d = (0..fx.rows())
                .map(|i| self.variance * fx.row(i).iter().map(|v| v * v).sum::<f64>())
                .collect();
            return Ok(Covariance::Diag(d));
        }
        Ok(Covariance::Full(fx.matmul(&fz.transpose())?.scale(self.variance)))
    }
}

// ─── Composite kernel ───────────────────────────────────────────────

/// Diffusion covariance, optionally multiplied element-wise by a
/// feature kernel evaluated at the same nodes.
pub struct CompositeKernel {
    diffusion: DiffusionKernel,
    base: Option<Box<dyn Kernel>>,
}

impl CompositeKernel {
    pub fn new(diffusion: DiffusionKernel, base: Option<Box<dyn Kernel>>) -> Self {
        Self { diffusion, base }
    }

    pub fn diffusion_kernel(&self) -> &DiffusionKernel {
        &self.diffusion
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }
}

fn check_aligned(input: &KernelInput<'_>) -> BronxResult<()> {
    if let (Some(idx), Some(f)) = (input.indices, input.features) {
        if idx.len() != f.rows() {
            return Err(BronxError::Shape(format!(
                "{} node indices but {} feature rows",
                idx.len(),
                f.rows()
            )));
        }
    }
    Ok(())
}

impl Kernel for CompositeKernel {
    fn evaluate(
        &self,
        x: &KernelInput<'_>,
        z: Option<&KernelInput<'_>>,
        diag: bool,
    ) -> BronxResult<Covariance> {
        let graph_term = self.diffusion.evaluate(x, z, diag)?;
        match &self.base {
            None => Ok(graph_term),
            Some(base) => {
                check_aligned(x)?;
                if let Some(z) = z {
                    check_aligned(z)?;
                }
                let feature_term = base.evaluate(x, z, diag)?;
                graph_term.hadamard(&feature_term)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bronx_diffusion::diffusion_operator;

    fn ring(n: usize) -> Graph {
        let pairs: Vec<(usize, usize)> = (0..n).map(|i| (i, (i + 1) % n)).collect();
        Graph::undirected(n, &pairs).unwrap()
    }

    fn diffusion_kernel() -> DiffusionKernel {
        DiffusionKernel::new(Arc::new(GraphDiffusion::default()), 8)
    }

    fn features() -> Matrix {
        Matrix::from_rows(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.5, 0.5],
            vec![-1.0, 2.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_diffusion_slice_matches_operator() {
        let g = ring(5);
        let phi = diffusion_operator(&g).unwrap();
        let k = diffusion_kernel();
        let cov = k.variance(&g, &[0, 3], Some(&[1, 2, 4]), false).unwrap();
        match &*cov {
            Covariance::Full(m) => {
                assert_eq!(m.shape(), (2, 3));
                assert_eq!(m[(1, 2)], phi[(3, 4)]);
                assert_eq!(m[(0, 0)], phi[(0, 1)]);
            }
            other => panic!("expected full covariance, got {other:?}"),
        }
    }

    #[test]
    fn test_diffusion_diag() {
        let g = ring(4);
        let phi = diffusion_operator(&g).unwrap();
        let k = diffusion_kernel();
        let d = k.diag(&KernelInput::nodes(&g, &[2, 0])).unwrap();
        assert_eq!(d, vec![phi[(2, 2)], phi[(0, 0)]]);
    }

    #[test]
    fn test_diffusion_z_defaults_to_x() {
        let g = ring(4);
        let k = diffusion_kernel();
        let a = k.variance(&g, &[0, 1], None, false).unwrap();
        let b = k.variance(&g, &[0, 1], Some(&[0, 1]), false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_diffusion_symmetric_on_regular_graph() {
        let g = ring(6);
        let idx = [0, 2, 3, 5];
        let m = diffusion_kernel()
            .matrix(&KernelInput::nodes(&g, &idx), None)
            .unwrap();
        assert!(m.is_symmetric(1e-12));
    }

    #[test]
    fn test_diffusion_transpose_relation() {
        let g = ring(6);
        let k = diffusion_kernel();
        let x = [0, 1];
        let z = [3, 4, 5];
        let kxz = k
            .matrix(&KernelInput::nodes(&g, &x), Some(&KernelInput::nodes(&g, &z)))
            .unwrap();
        let kzx = k
            .matrix(&KernelInput::nodes(&g, &z), Some(&KernelInput::nodes(&g, &x)))
            .unwrap();
        assert!(kxz.max_abs_diff(&kzx.transpose()) < 1e-12);
    }

    #[test]
    fn test_diffusion_cache_bounded() {
        let g = ring(4);
        let k = DiffusionKernel::new(Arc::new(GraphDiffusion::default()), 2);
        for i in 0..4 {
            k.variance(&g, &[i], None, false).unwrap();
        }
        assert_eq!(k.cache_len(), 2);
        assert_eq!(k.invalidate(&g), 2);
        assert_eq!(k.cache_len(), 0);
    }

    #[test]
    fn test_diffusion_cache_keyed_by_value() {
        let mut g = ring(4);
        let k = diffusion_kernel();
        let before = k.variance(&g, &[0], Some(&[2]), false).unwrap();
        g.add_edge(0, 2).unwrap();
        let after = k.variance(&g, &[0], Some(&[2]), false).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_ne!(*before, *after);
    }

    #[test]
    fn test_diffusion_requires_graph_and_indices() {
        let k = diffusion_kernel();
        let f = features();
        assert_eq!(
            k.evaluate(&KernelInput::features(&f), None, false),
            Err(BronxError::MissingArgument("graph"))
        );
        let g = ring(4);
        let input = KernelInput {
            graph: Some(&g),
            ..Default::default()
        };
        assert_eq!(
            k.evaluate(&input, None, false),
            Err(BronxError::MissingArgument("indices"))
        );
    }

    #[test]
    fn test_diffusion_out_of_range_index() {
        let g = ring(4);
        let k = diffusion_kernel();
        assert!(matches!(
            k.variance(&g, &[7], None, false),
            Err(BronxError::IndexOutOfRange { index: 7, len: 4 })
        ));
        assert!(matches!(
            k.variance(&g, &[7], None, true),
            Err(BronxError::IndexOutOfRange { index: 7, len: 4 })
        ));
    }

    #[test]
    fn test_rbf_values() {
        let f = features();
        let k = RbfKernel::new(2.0, 1.0).unwrap();
        let m = k.matrix(&KernelInput::features(&f), None).unwrap();
        assert!(m.is_symmetric(0.0));
        assert_eq!(m.diag(), vec![2.0; 4]);
        // ‖(0,1) - (1,0)‖² = 2 → 2·exp(-1)
        assert!((m[(0, 1)] - 2.0 * (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(k.diag(&KernelInput::features(&f)).unwrap(), vec![2.0; 4]);
    }

    #[test]
    fn test_rbf_rejects_bad_params() {
        assert!(RbfKernel::new(0.0, 1.0).is_err());
        assert!(RbfKernel::new(1.0, -1.0).is_err());
    }

    #[test]
    fn test_rbf_cross_covariance_shape() {
        let f = features();
        let z = f.select_rows(&[0, 1]).unwrap();
        let k = RbfKernel::default();
        let m = k
            .matrix(&KernelInput::features(&f), Some(&KernelInput::features(&z)))
            .unwrap();
        assert_eq!(m.shape(), (4, 2));
    }

    #[test]
    fn test_linear_kernel() {
        let f = features();
        let k = LinearKernel::new(0.5).unwrap();
        let m = k.matrix(&KernelInput::features(&f), None).unwrap();
        assert!((m[(3, 3)] - 0.5 * 5.0).abs() < 1e-12);
        assert!((m[(0, 1)]).abs() < 1e-12);
        let d = k.diag(&KernelInput::features(&f)).unwrap();
        assert_eq!(d, m.diag());
    }

    #[test]
    fn test_composite_without_base_is_diffusion() {
        let g = ring(4);
        let idx = [0, 1, 2, 3];
        let composite = CompositeKernel::new(diffusion_kernel(), None);
        let plain = diffusion_kernel();
        let input = KernelInput::nodes(&g, &idx);
        assert_eq!(
            composite.matrix(&input, None).unwrap(),
            plain.matrix(&input, None).unwrap()
        );
    }

    #[test]
    fn test_composite_multiplies_terms() {
        let g = ring(4);
        let idx = [0, 1, 2, 3];
        let f = features();
        let rbf = RbfKernel::new(1.0, 0.7).unwrap();
        let composite = CompositeKernel::new(diffusion_kernel(), Some(Box::new(rbf)));
        let input = KernelInput::nodes(&g, &idx).with_features(&f);
        let m = composite.matrix(&input, None).unwrap();

        let graph_term = diffusion_kernel().matrix(&input, None).unwrap();
        let feature_term = rbf.matrix(&input, None).unwrap();
        let expected = graph_term.hadamard(&feature_term).unwrap();
        assert!(m.max_abs_diff(&expected) < 1e-15);

        let d = composite.diag(&input).unwrap();
        assert!(d
            .iter()
            .zip(expected.diag())
            .all(|(a, b)| (a - b).abs() < 1e-15));
    }

    #[test]
    fn test_composite_requires_features_with_base() {
        let g = ring(4);
        let idx = [0, 1];
        let composite =
            CompositeKernel::new(diffusion_kernel(), Some(Box::new(RbfKernel::default())));
        assert_eq!(
            composite.evaluate(&KernelInput::nodes(&g, &idx), None, false),
            Err(BronxError::MissingArgument("features"))
        );
    }

    #[test]
    fn test_composite_misaligned_features() {
        let g = ring(4);
        let idx = [0, 1];
        let f = features();
        let composite =
            CompositeKernel::new(diffusion_kernel(), Some(Box::new(RbfKernel::default())));
        let input = KernelInput::nodes(&g, &idx).with_features(&f);
        assert!(matches!(
            composite.evaluate(&input, None, false),
            Err(BronxError::Shape(_))
        ));
    }

    #[test]
    fn test_covariance_hadamard_kind_mismatch() {
        let a = Covariance::Full(Matrix::identity(2));
        let b = Covariance::Diag(vec![1.0, 1.0]);
        assert!(a.hadamard(&b).is_err());
    }
}
