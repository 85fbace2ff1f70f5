// ─────────────────────────────────────────────────────────────────────
// Bronx — Likelihoods
// ─────────────────────────────────────────────────────────────────────
//! Expected log-likelihood `E_q(f)[log p(y | f)]` under the marginal
//! Gaussian `q(f) = N(loc, var)` at the training nodes.

use parking_lot::Mutex;

use bronx_types::{BronxError, BronxResult, Matrix, SimpleRng};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Observed targets at the training nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    /// L×M real-valued observations.
    Real(Matrix),
    /// One class index per node.
    Classes(Vec<usize>),
}

impl Targets {
    /// Number of observed nodes.
    pub fn len(&self) -> usize {
        match self {
            Targets::Real(y) => y.cols(),
            Targets::Classes(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observation model consumed by the SVGP wrapper.
pub trait Likelihood: Send + Sync {
    /// Expected log-likelihood summed over nodes. `loc` and `var` are L×M.
    fn log_likelihood(&self, loc: &Matrix, var: &Matrix, targets: &Targets) -> BronxResult<f64>;

    /// Flat view of learnable likelihood parameters.
    fn parameters(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Replace learnable parameters from a flat slice.
    fn load_parameters(&mut self, params: &[f64]) -> BronxResult<()> {
        if params.is_empty() {
            Ok(())
        } else {
            Err(BronxError::Shape(format!(
                "likelihood has no parameters, got {}",
                params.len()
            )))
        }
    }
}

fn check_moments(loc: &Matrix, var: &Matrix, targets: &Targets) -> BronxResult<()> {
    if loc.shape() != var.shape() {
        return Err(BronxError::Shape(format!(
            "loc is {}x{} but var is {}x{}",
            loc.rows(),
            loc.cols(),
            var.rows(),
            var.cols()
        )));
    }
    if targets.len() != loc.cols() {
        return Err(BronxError::Shape(format!(
            "{} targets for {} nodes",
            targets.len(),
            loc.cols()
        )));
    }
    Ok(())
}

/// Homoscedastic Gaussian noise `y ~ N(f, σ²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianLikelihood {
    variance: f64,
}

impl GaussianLikelihood {
    pub fn new(variance: f64) -> BronxResult<Self> {
        if !(variance.is_finite() && variance > 0.0) {
            return Err(BronxError::Config(format!(
                "noise variance must be finite and > 0, got {variance}"
            )));
        }
        Ok(Self { variance })
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Likelihood for GaussianLikelihood {
    fn log_likelihood(&self, loc: &Matrix, var: &Matrix, targets: &Targets) -> BronxResult<f64> {
        check_moments(loc, var, targets)?;
        let y = match targets {
            Targets::Real(y) => y,
            Targets::Classes(_) => {
                return Err(BronxError::Shape(
                    "gaussian likelihood needs real-valued targets".into(),
                ))
            }
        };
        if y.shape() != loc.shape() {
            return Err(BronxError::Shape(format!(
                "targets are {}x{}, predictions {}x{}",
                y.rows(),
                y.cols(),
                loc.rows(),
                loc.cols()
            )));
        }
        let s2 = self.variance;
        let norm = LN_2PI + s2.ln();
        let total = y
            .as_slice()
            .iter()
            .zip(loc.as_slice())
            .zip(var.as_slice())
            .map(|((yi, mi), vi)| -0.5 * (norm + ((yi - mi) * (yi - mi) + vi) / s2))
            .sum();
        Ok(total)
    }

    fn parameters(&self) -> Vec<f64> {
        vec![self.variance]
    }

    fn load_parameters(&mut self, params: &[f64]) -> BronxResult<()> {
        match params {
            [v] => {
                *self = Self::new(*v)?;
                Ok(())
            }
            _ => Err(BronxError::Shape(format!(
                "gaussian likelihood takes 1 parameter, got {}",
                params.len()
            ))),
        }
    }
}

/// Categorical over latents with softmax link, estimated by Monte-Carlo
/// draws `f = loc + sqrt(var) ε`.
pub struct SoftmaxLikelihood {
    num_samples: usize,
    rng: Mutex<SimpleRng>,
}

impl SoftmaxLikelihood {
    pub fn new(num_samples: usize, seed: u64) -> Self {
        Self {
            num_samples: num_samples.max(1),
            rng: Mutex::new(SimpleRng::new(seed)),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
}

/// `log softmax(f)[target]`, computed stably.
fn log_softmax_at(f: &[f64], target: usize) -> f64 {
    let max = f.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lse = max + f.iter().map(|v| (v - max).exp()).sum::<f64>().ln();
    f[target] - lse
}

impl Likelihood for SoftmaxLikelihood {
    fn log_likelihood(&self, loc: &Matrix, var: &Matrix, targets: &Targets) -> BronxResult<f64> {
        check_moments(loc, var, targets)?;
        let classes = match targets {
            Targets::Classes(c) => c,
            Targets::Real(_) => {
                return Err(BronxError::Shape(
                    "softmax likelihood needs class targets".into(),
                ))
            }
        };
        let latent = loc.rows();
        if let Some(&bad) = classes.iter().find(|&&c| c >= latent) {
            return Err(BronxError::IndexOutOfRange {
                index: bad,
                len: latent,
            });
        }

        let mut rng = self.rng.lock();
        let mut f = vec![0.0; latent];
        let mut total = 0.0;
        for (node, &target) in classes.iter().enumerate() {
            let mut acc = 0.0;
            for _ in 0..self.num_samples {
                for (l, fl) in f.iter_mut().enumerate() {
                    let sd = var[(l, node)].max(0.0).sqrt();
                    *fl = loc[(l, node)] + sd * rng.next_normal();
                }
                acc += log_softmax_at(&f, target);
            }
            total += acc / self.num_samples as f64;
        }
        if !total.is_finite() {
            log::warn!("softmax likelihood estimate is not finite");
            return Err(BronxError::Numerical(
                "softmax log-likelihood is NaN/Inf".into(),
            ));
        }
        Ok(total)
    }
}

type LogLikelihoodFn = Box<dyn Fn(&Matrix, &Matrix, &Targets) -> BronxResult<f64> + Send + Sync>;

/// Likelihood that delegates to a caller-supplied function.
///
/// Used by the PyO3 layer to keep the observation model in Python.
pub struct ExternalLikelihood {
    log_likelihood_fn: LogLikelihoodFn,
}

impl ExternalLikelihood {
    pub fn new(
        f: impl Fn(&Matrix, &Matrix, &Targets) -> BronxResult<f64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log_likelihood_fn: Box::new(f),
        }
    }
}

impl Likelihood for ExternalLikelihood {
    fn log_likelihood(&self, loc: &Matrix, var: &Matrix, targets: &Targets) -> BronxResult<f64> {
        (self.log_likelihood_fn)(loc, var, targets)
    }
}
