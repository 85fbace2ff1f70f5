// ─────────────────────────────────────────────────────────────────────
// Bronx — Variational Parameters
// ─────────────────────────────────────────────────────────────────────
//! Learnable variational distribution `q(u) = Π_l N(m_l, S_l S_lᵀ)`
//! over the inducing values at every graph node.

use serde::{Deserialize, Serialize};

use bronx_types::{BronxError, BronxResult, Matrix};

/// Mean `loc` (L×N) and one lower-triangular `scale_tril` (N×N) per latent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationalParams {
    loc: Matrix,
    scale_tril: Vec<Matrix>,
}

impl VariationalParams {
    /// Zero mean and identity scale for `latent_dim` latents over
    /// `num_inducing` nodes.
    pub fn new(latent_dim: usize, num_inducing: usize) -> Self {
        Self {
            loc: Matrix::zeros(latent_dim, num_inducing),
            scale_tril: (0..latent_dim)
                .map(|_| Matrix::identity(num_inducing))
                .collect(),
        }
    }

    /// Build from explicit parts, checking every shape.
    pub fn from_parts(loc: Matrix, scale_tril: Vec<Matrix>) -> BronxResult<Self> {
        let (l, n) = loc.shape();
        if scale_tril.len() != l {
            return Err(BronxError::Shape(format!(
                "{} scale factors for {l} latents",
                scale_tril.len()
            )));
        }
        for (i, s) in scale_tril.iter().enumerate() {
            if s.shape() != (n, n) {
                return Err(BronxError::Shape(format!(
                    "scale factor {i} is {}x{}, expected {n}x{n}",
                    s.rows(),
                    s.cols()
                )));
            }
            if !s.is_lower_triangular() {
                return Err(BronxError::Shape(format!(
                    "scale factor {i} is not lower triangular"
                )));
            }
        }
        Ok(Self { loc, scale_tril })
    }

    pub fn latent_dim(&self) -> usize {
        self.loc.rows()
    }

    pub fn num_inducing(&self) -> usize {
        self.loc.cols()
    }

    pub fn loc(&self) -> &Matrix {
        &self.loc
    }

    pub fn loc_mut(&mut self) -> &mut Matrix {
        &mut self.loc
    }

    pub fn scale_tril(&self) -> &[Matrix] {
        &self.scale_tril
    }

    /// Mutable access to the scale factors. Callers keep them lower
    /// triangular; the upper triangle is never read.
    pub fn scale_tril_mut(&mut self) -> &mut [Matrix] {
        &mut self.scale_tril
    }

    /// `S_l S_lᵀ` for latent `l`.
    pub fn covariance(&self, l: usize) -> BronxResult<Matrix> {
        let s = self.scale_tril.get(l).ok_or(BronxError::IndexOutOfRange {
            index: l,
            len: self.scale_tril.len(),
        })?;
        s.matmul(&s.transpose())
    }

    /// Pack into the N×L mean and N×(N·L) scale layouts used by the
    /// conditional, with scale column `j·L + l` holding `S_l[:, j]`.
    pub(crate) fn packed(&self) -> (Matrix, Matrix) {
        let l = self.latent_dim();
        let n = self.num_inducing();
        let loc = self.loc.transpose();
        let scale = Matrix::from_fn(n, n * l, |i, c| self.scale_tril[c % l][(i, c / l)]);
        (loc, scale)
    }
}
