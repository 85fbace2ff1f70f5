// ─────────────────────────────────────────────────────────────────────
// Bronx — Dense Projections
// Mirrors: bronx/layers.py
// ─────────────────────────────────────────────────────────────────────
//! Point-estimate and Bayesian affine maps `x W + b` over row-major
//! node feature matrices.

use serde::{Deserialize, Serialize};

use bronx_types::{BronxError, BronxResult, Matrix, SimpleRng};

/// Initial posterior scale of Bayesian weights.
const INIT_SCALE: f64 = 0.1;

fn add_bias(out: &mut Matrix, bias: &[f64]) {
    for r in 0..out.rows() {
        for (o, b) in out.row_mut(r).iter_mut().zip(bias) {
            *o += b;
        }
    }
}

fn check_input(x: &Matrix, in_features: usize) -> BronxResult<()> {
    if x.cols() != in_features {
        return Err(BronxError::Shape(format!(
            "input has {} features, layer expects {in_features}",
            x.cols()
        )));
    }
    Ok(())
}

/// Deterministic affine layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// in×out
    weight: Matrix,
    bias: Option<Vec<f64>>,
}

impl Linear {
    /// Weights drawn from `N(0, 1/in)`, bias zeroed.
    pub fn new(in_features: usize, out_features: usize, bias: bool, rng: &mut SimpleRng) -> Self {
        let mut weight = Matrix::zeros(in_features, out_features);
        let std = 1.0 / (in_features.max(1) as f64).sqrt();
        rng.fill_normal(weight.as_mut_slice(), std);
        Self {
            weight,
            bias: bias.then(|| vec![0.0; out_features]),
        }
    }

    pub fn from_parts(weight: Matrix, bias: Option<Vec<f64>>) -> BronxResult<Self> {
        if let Some(b) = &bias {
            if b.len() != weight.cols() {
                return Err(BronxError::Shape(format!(
                    "bias of length {} for {} outputs",
                    b.len(),
                    weight.cols()
                )));
            }
        }
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.rows()
    }

    pub fn out_features(&self) -> usize {
        self.weight.cols()
    }

    pub fn weight(&self) -> &Matrix {
        &self.weight
    }

    pub fn weight_mut(&mut self) -> &mut Matrix {
        &mut self.weight
    }

    pub fn bias(&self) -> Option<&[f64]> {
        self.bias.as_deref()
    }

    pub fn bias_mut(&mut self) -> Option<&mut [f64]> {
        self.bias.as_deref_mut()
    }

    pub fn forward(&self, x: &Matrix) -> BronxResult<Matrix> {
        check_input(x, self.in_features())?;
        let mut out = x.matmul(&self.weight)?;
        if let Some(b) = &self.bias {
            add_bias(&mut out, b);
        }
        Ok(out)
    }
}

/// Affine layer with a factorised Gaussian weight posterior
/// `W ~ N(loc, exp(log_scale)²)` and a standard-normal weight prior.
/// The bias is a point estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianLinear {
    loc: Matrix,
    log_scale: Matrix,
    bias: Option<Vec<f64>>,
}

impl BayesianLinear {
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> Self {
        let mut log_scale = Matrix::zeros(in_features, out_features);
        log_scale.as_mut_slice().fill(INIT_SCALE.ln());
        Self {
            loc: Matrix::zeros(in_features, out_features),
            log_scale,
            bias: bias.then(|| vec![0.0; out_features]),
        }
    }

    pub fn in_features(&self) -> usize {
        self.loc.rows()
    }

    pub fn out_features(&self) -> usize {
        self.loc.cols()
    }

    pub fn loc(&self) -> &Matrix {
        &self.loc
    }

    pub fn loc_mut(&mut self) -> &mut Matrix {
        &mut self.loc
    }

    pub fn log_scale(&self) -> &Matrix {
        &self.log_scale
    }

    pub fn log_scale_mut(&mut self) -> &mut Matrix {
        &mut self.log_scale
    }

    pub fn bias(&self) -> Option<&[f64]> {
        self.bias.as_deref()
    }

    /// One reparameterised weight draw `loc + exp(log_scale) ε`.
    pub fn sample_weight(&self, rng: &mut SimpleRng) -> Matrix {
        let mut w = self.loc.clone();
        for (wi, ls) in w.as_mut_slice().iter_mut().zip(self.log_scale.as_slice()) {
            *wi += ls.exp() * rng.next_normal();
        }
        w
    }

    /// Forward pass through a freshly sampled weight matrix.
    pub fn forward(&self, x: &Matrix, rng: &mut SimpleRng) -> BronxResult<Matrix> {
        check_input(x, self.in_features())?;
        let mut out = x.matmul(&self.sample_weight(rng))?;
        if let Some(b) = &self.bias {
            add_bias(&mut out, b);
        }
        Ok(out)
    }

    /// Forward pass through the posterior mean.
    pub fn forward_mean(&self, x: &Matrix) -> BronxResult<Matrix> {
        check_input(x, self.in_features())?;
        let mut out = x.matmul(&self.loc)?;
        if let Some(b) = &self.bias {
            add_bias(&mut out, b);
        }
        Ok(out)
    }

    /// `KL(q(W) ‖ N(0, 1))` summed over weights.
    pub fn kl_divergence(&self) -> f64 {
        normal_kl_to_standard(self.loc.as_slice(), self.log_scale.as_slice())
    }
}

/// `Σ KL(N(μ, σ²) ‖ N(0, 1))` for parallel slices of means and log scales.
pub fn normal_kl_to_standard(mu: &[f64], log_sigma: &[f64]) -> f64 {
    mu.iter()
        .zip(log_sigma)
        .map(|(m, ls)| 0.5 * ((2.0 * ls).exp() + m * m - 1.0) - ls)
        .sum()
}

/// Either kind of projection, so layers can switch weight treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dense {
    Point(Linear),
    Bayesian(BayesianLinear),
}

impl Dense {
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        bayesian: bool,
        rng: &mut SimpleRng,
    ) -> Self {
        if bayesian {
            Dense::Bayesian(BayesianLinear::new(in_features, out_features, bias))
        } else {
            Dense::Point(Linear::new(in_features, out_features, bias, rng))
        }
    }

    pub fn in_features(&self) -> usize {
        match self {
            Dense::Point(l) => l.in_features(),
            Dense::Bayesian(l) => l.in_features(),
        }
    }

    pub fn out_features(&self) -> usize {
        match self {
            Dense::Point(l) => l.out_features(),
            Dense::Bayesian(l) => l.out_features(),
        }
    }

    /// Bayesian projections draw a fresh weight sample from `rng`.
    pub fn forward(&self, x: &Matrix, rng: &mut SimpleRng) -> BronxResult<Matrix> {
        match self {
            Dense::Point(l) => l.forward(x),
            Dense::Bayesian(l) => l.forward(x, rng),
        }
    }

    pub fn kl_divergence(&self) -> f64 {
        match self {
            Dense::Point(_) => 0.0,
            Dense::Bayesian(l) => l.kl_divergence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_forward() {
        let w = Matrix::from_rows(&[vec![1.0, 0.0, 2.0], vec![0.0, 1.0, -1.0]]).unwrap();
        let lin = Linear::from_parts(w, Some(vec![0.5, 0.0, 0.0])).unwrap();
        let x = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let y = lin.forward(&x).unwrap();
        assert_eq!(y.to_rows(), vec![vec![1.5, 2.0, 0.0], vec![3.5, 4.0, 2.0]]);
    }

    #[test]
    fn test_linear_shape_checks() {
        let mut rng = SimpleRng::new(1);
        let lin = Linear::new(3, 2, false, &mut rng);
        assert!(lin.bias().is_none());
        assert!(lin.forward(&Matrix::zeros(4, 2)).is_err());
        assert_eq!(lin.forward(&Matrix::zeros(4, 3)).unwrap().shape(), (4, 2));
        assert!(Linear::from_parts(Matrix::zeros(2, 2), Some(vec![0.0])).is_err());
    }

    #[test]
    fn test_bayesian_mean_forward_is_deterministic() {
        let mut layer = BayesianLinear::new(2, 2, true);
        layer.loc_mut()[(0, 1)] = 3.0;
        let x = Matrix::from_rows(&[vec![1.0, 0.0]]).unwrap();
        let y = layer.forward_mean(&x).unwrap();
        assert_eq!(y.to_rows(), vec![vec![0.0, 3.0]]);
    }

    #[test]
    fn test_bayesian_samples_vary() {
        let layer = BayesianLinear::new(2, 2, false);
        let mut rng = SimpleRng::new(4);
        let a = layer.sample_weight(&mut rng);
        let b = layer.sample_weight(&mut rng);
        assert_ne!(a, b);
        assert!(a.as_slice().iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_bayesian_kl() {
        let mut layer = BayesianLinear::new(1, 1, false);
        layer.log_scale_mut()[(0, 0)] = 0.0;
        assert!(layer.kl_divergence().abs() < 1e-15);
        layer.loc_mut()[(0, 0)] = 2.0;
        assert!((layer.kl_divergence() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_dense_dispatch() {
        let mut rng = SimpleRng::new(2);
        let point = Dense::new(3, 4, true, false, &mut rng);
        let bayes = Dense::new(3, 4, true, true, &mut rng);
        assert_eq!(point.kl_divergence(), 0.0);
        assert!(bayes.kl_divergence() > 0.0);
        let x = Matrix::zeros(2, 3);
        assert_eq!(point.forward(&x, &mut rng).unwrap().shape(), (2, 4));
        assert_eq!(bayes.forward(&x, &mut rng).unwrap().shape(), (2, 4));
        assert_eq!(bayes.in_features(), 3);
        assert_eq!(point.out_features(), 4);
    }
}
