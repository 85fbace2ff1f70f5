// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph-Conditional Posterior
// Mirrors: bronx/models.py
// ─────────────────────────────────────────────────────────────────────
//! Projects the inducing posterior `q(u)` through the diffusion operator
//! to the marginal `q(f)` at a set of query nodes.
//!
//! With `v = Lff⁻¹ m` and `S = Lff⁻¹ S_u` (or `m`, `S_u` directly when
//! whitened):
//!
//! ```text
//!   loc = ((K v)ᵀ Φ)[:, iX]
//!   W_S = (Φ (K S))[iX, :]
//!   cov_l = W_S,l W_S,lᵀ        var_l = Σ_j W_S,l[:, j]²
//! ```

use serde::{Deserialize, Serialize};

use bronx_diffusion::{cholesky, solve_lower_triangular, Graph, GraphDiffusion};
use bronx_types::{BronxConfig, BronxError, BronxResult, Matrix};

use crate::kernel::{Kernel, KernelInput};
use crate::params::VariationalParams;

/// Options for [`graph_conditional`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionalOptions {
    pub full_cov: bool,
    pub whiten: bool,
    pub jitter: f64,
}

impl Default for ConditionalOptions {
    fn default() -> Self {
        Self {
            full_cov: false,
            whiten: false,
            jitter: 1e-6,
        }
    }
}

impl ConditionalOptions {
    pub fn from_config(config: &BronxConfig) -> Self {
        Self {
            full_cov: config.full_cov,
            whiten: config.whiten,
            jitter: config.jitter,
        }
    }
}

/// Predictive covariance at the query nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictiveCovariance {
    /// One M×M block per latent.
    Full(Vec<Matrix>),
    /// L×M marginal variances.
    Variance(Matrix),
}

impl PredictiveCovariance {
    /// Marginal variances (L×M), taking diagonals of full blocks.
    pub fn variance(&self) -> BronxResult<Matrix> {
        match self {
            PredictiveCovariance::Variance(v) => Ok(v.clone()),
            PredictiveCovariance::Full(blocks) => {
                let m = blocks.first().map(|b| b.rows()).unwrap_or(0);
                let data: Vec<f64> = blocks.iter().flat_map(|b| b.diag()).collect();
                Matrix::from_vec(blocks.len(), m, data)
            }
        }
    }
}

/// Marginal `q(f)` at the query nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConditional {
    /// L×M predictive means.
    pub loc: Matrix,
    pub covariance: PredictiveCovariance,
}

/// Graph-conditional projection of `params` to the `query` nodes.
///
/// `inputs` are handed to `kernel` to build the N×N covariance `K`; `lff`
/// may carry a precomputed `chol(K + jitter I)` and is ignored when
/// whitening.
#[allow(clippy::too_many_arguments)]
pub fn graph_conditional(
    inputs: &KernelInput<'_>,
    graph: &Graph,
    diffusion: &GraphDiffusion,
    query: &[usize],
    kernel: &dyn Kernel,
    params: &VariationalParams,
    lff: Option<&Matrix>,
    options: &ConditionalOptions,
) -> BronxResult<GraphConditional> {
    let n = graph.num_nodes();
    let latent = params.latent_dim();
    if params.num_inducing() != n {
        return Err(BronxError::Shape(format!(
            "variational parameters cover {} nodes, graph has {n}",
            params.num_inducing()
        )));
    }
    if let Some(&bad) = query.iter().find(|&&i| i >= n) {
        return Err(BronxError::IndexOutOfRange { index: bad, len: n });
    }

    let phi = diffusion.operator(graph)?;
    let k = kernel.matrix(inputs, None)?;
    if k.shape() != (n, n) {
        return Err(BronxError::Shape(format!(
            "kernel matrix is {}x{}, expected {n}x{n}",
            k.rows(),
            k.cols()
        )));
    }

    let (f_loc, f_scale) = params.packed();
    let (v, s) = if options.whiten {
        (f_loc, f_scale)
    } else {
        let owned;
        let lff = match lff {
            Some(l) => {
                if l.shape() != (n, n) {
                    return Err(BronxError::Shape(format!(
                        "Lff is {}x{}, expected {n}x{n}",
                        l.rows(),
                        l.cols()
                    )));
                }
                l
            }
            None => {
                let mut kj = k.clone();
                kj.add_diagonal(options.jitter);
                owned = cholesky(&kj)?;
                &owned
            }
        };
        (
            solve_lower_triangular(lff, &f_loc)?,
            solve_lower_triangular(lff, &f_scale)?,
        )
    };

    let loc = k.matmul(&v)?.transpose().matmul(&phi)?.select_cols(query)?;
    let w_s = phi.matmul(&k.matmul(&s)?)?.select_rows(query)?;

    let m = query.len();
    let covariance = if options.full_cov {
        let mut blocks = Vec::with_capacity(latent);
        for l in 0..latent {
            let w_l = Matrix::from_fn(m, n, |r, j| w_s[(r, j * latent + l)]);
            blocks.push(w_l.matmul(&w_l.transpose())?);
        }
        PredictiveCovariance::Full(blocks)
    } else {
        let mut var = Matrix::zeros(latent, m);
        for r in 0..m {
            for (c, w) in w_s.row(r).iter().enumerate() {
                var[(c % latent, r)] += w * w;
            }
        }
        PredictiveCovariance::Variance(var)
    };

    if !loc.is_finite() {
        log::warn!("graph conditional produced non-finite means");
        return Err(BronxError::Numerical(
            "graph conditional mean contains NaN/Inf".into(),
        ));
    }
    Ok(GraphConditional { loc, covariance })
}
