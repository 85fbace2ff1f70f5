// ─────────────────────────────────────────────────────────────────────
// Bronx — Variational Edge Message Passing
// Mirrors: bronx/layers.py
// ─────────────────────────────────────────────────────────────────────
//! Multi-head message passing whose per-edge, per-head weights are
//! latent Gaussian variables.
//!
//! Prior:  e[edge, head] ~ N(0, 1)
//! Guide:  e[edge, head] ~ N(μ, σ) with
//!           μ     = ⟨fc_mu(h)[src, head],        fc_mu(h)[dst, head]⟩
//!           log σ = ⟨fc_log_sigma(h)[src, head], fc_log_sigma(h)[dst, head]⟩
//! Propagation aggregates each head's feature chunk along sampled edges
//! (`out[dst] += e · h[src]`) and applies the output projection.

use serde::{Deserialize, Serialize};

use bronx_diffusion::Graph;
use bronx_types::{BronxError, BronxResult, Matrix, SimpleRng};

use crate::linear::{normal_kl_to_standard, Dense};

/// Shape and weight treatment of a [`BronxLayer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BronxLayerConfig {
    pub in_features: usize,
    pub out_features: usize,
    /// Per-head width of the edge embeddings. Defaults to `out_features / num_heads`.
    pub embedding_features: Option<usize>,
    pub num_heads: usize,
    /// Use Bayesian projections instead of point estimates.
    pub bayesian_weights: bool,
}

impl BronxLayerConfig {
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            embedding_features: None,
            num_heads: 1,
            bayesian_weights: false,
        }
    }

    pub fn validate(&self) -> BronxResult<()> {
        if self.num_heads == 0 {
            return Err(BronxError::Config("num_heads must be >= 1".into()));
        }
        if self.in_features == 0 || self.out_features == 0 {
            return Err(BronxError::Config("layer widths must be >= 1".into()));
        }
        if self.in_features % self.num_heads != 0 {
            return Err(BronxError::Config(format!(
                "in_features {} not divisible by {} heads",
                self.in_features, self.num_heads
            )));
        }
        if self.embedding_width() == 0 {
            return Err(BronxError::Config(
                "edge embedding width per head must be >= 1".into(),
            ));
        }
        Ok(())
    }

    fn embedding_width(&self) -> usize {
        self.embedding_features
            .unwrap_or(self.out_features / self.num_heads.max(1))
    }
}

/// Variational posterior over edge weights, E×H each.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePosterior {
    pub mu: Matrix,
    pub log_sigma: Matrix,
}

impl EdgePosterior {
    pub fn num_edges(&self) -> usize {
        self.mu.rows()
    }

    pub fn num_heads(&self) -> usize {
        self.mu.cols()
    }

    /// Reparameterised draw `μ + exp(log σ) ε`.
    pub fn sample(&self, rng: &mut SimpleRng) -> Matrix {
        let mut e = self.mu.clone();
        for (ei, ls) in e.as_mut_slice().iter_mut().zip(self.log_sigma.as_slice()) {
            *ei += ls.exp() * rng.next_normal();
        }
        e
    }

    /// `KL(q(e) ‖ N(0, 1))` summed over edges and heads.
    pub fn kl_divergence(&self) -> f64 {
        normal_kl_to_standard(self.mu.as_slice(), self.log_sigma.as_slice())
    }
}

/// Message-passing layer with latent edge weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BronxLayer {
    config: BronxLayerConfig,
    fc: Dense,
    fc_mu: Dense,
    fc_log_sigma: Dense,
}

impl BronxLayer {
    pub fn new(config: BronxLayerConfig, rng: &mut SimpleRng) -> BronxResult<Self> {
        config.validate()?;
        let edge_width = config.num_heads * config.embedding_width();
        let bayes = config.bayesian_weights;
        Ok(Self {
            fc: Dense::new(config.in_features, config.out_features, true, bayes, rng),
            fc_mu: Dense::new(config.in_features, edge_width, false, bayes, rng),
            fc_log_sigma: Dense::new(config.in_features, edge_width, false, bayes, rng),
            config,
        })
    }

    pub fn config(&self) -> &BronxLayerConfig {
        &self.config
    }

    pub fn num_heads(&self) -> usize {
        self.config.num_heads
    }

    pub fn fc(&self) -> &Dense {
        &self.fc
    }

    pub fn fc_mut(&mut self) -> &mut Dense {
        &mut self.fc
    }

    pub fn fc_mu_mut(&mut self) -> &mut Dense {
        &mut self.fc_mu
    }

    pub fn fc_log_sigma_mut(&mut self) -> &mut Dense {
        &mut self.fc_log_sigma
    }

    fn check_nodes(&self, graph: &Graph, h: &Matrix) -> BronxResult<()> {
        if h.rows() != graph.num_nodes() {
            return Err(BronxError::Shape(format!(
                "{} feature rows for {} nodes",
                h.rows(),
                graph.num_nodes()
            )));
        }
        if h.cols() != self.config.in_features {
            return Err(BronxError::Shape(format!(
                "input has {} features, layer expects {}",
                h.cols(),
                self.config.in_features
            )));
        }
        Ok(())
    }

    /// Edge weights drawn from the standard-normal prior.
    pub fn sample_prior_edges(&self, graph: &Graph, rng: &mut SimpleRng) -> Matrix {
        let mut e = Matrix::zeros(graph.num_edges(), self.num_heads());
        rng.fill_normal(e.as_mut_slice(), 1.0);
        e
    }

    /// Variational edge posterior from node features.
    pub fn guide(
        &self,
        graph: &Graph,
        h: &Matrix,
        rng: &mut SimpleRng,
    ) -> BronxResult<EdgePosterior> {
        self.check_nodes(graph, h)?;
        let mu_nodes = self.fc_mu.forward(h, rng)?;
        let ls_nodes = self.fc_log_sigma.forward(h, rng)?;
        let heads = self.num_heads();
        let width = self.config.embedding_width();
        let (src, dst) = graph.edges();

        let per_head_dot = |nodes: &Matrix, s: usize, d: usize, head: usize| -> f64 {
            let lo = head * width;
            nodes.row(s)[lo..lo + width]
                .iter()
                .zip(&nodes.row(d)[lo..lo + width])
                .map(|(a, b)| a * b)
                .sum()
        };

        let mu = Matrix::from_fn(src.len(), heads, |e, k| {
            per_head_dot(&mu_nodes, src[e], dst[e], k)
        });
        let log_sigma = Matrix::from_fn(src.len(), heads, |e, k| {
            per_head_dot(&ls_nodes, src[e], dst[e], k)
        });
        Ok(EdgePosterior { mu, log_sigma })
    }

    /// Aggregate each head's feature chunk along weighted edges, then project.
    pub fn propagate(
        &self,
        graph: &Graph,
        h: &Matrix,
        edges: &Matrix,
        rng: &mut SimpleRng,
    ) -> BronxResult<Matrix> {
        self.check_nodes(graph, h)?;
        let heads = self.num_heads();
        if edges.shape() != (graph.num_edges(), heads) {
            return Err(BronxError::Shape(format!(
                "edge weights are {}x{}, expected {}x{heads}",
                edges.rows(),
                edges.cols(),
                graph.num_edges()
            )));
        }
        let chunk = self.config.in_features / heads;
        let (src, dst) = graph.edges();
        let mut agg = Matrix::zeros(h.rows(), h.cols());
        for (e, (&s, &d)) in src.iter().zip(dst).enumerate() {
            for k in 0..heads {
                let w = edges[(e, k)];
                if w == 0.0 {
                    continue;
                }
                for c in k * chunk..(k + 1) * chunk {
                    agg[(d, c)] += w * h[(s, c)];
                }
            }
        }
        self.fc.forward(&agg, rng)
    }

    /// Guide, sample and propagate in one pass. Returns the output and
    /// the edge posterior used.
    pub fn forward(
        &self,
        graph: &Graph,
        h: &Matrix,
        rng: &mut SimpleRng,
    ) -> BronxResult<(Matrix, EdgePosterior)> {
        let posterior = self.guide(graph, h, rng)?;
        let edges = posterior.sample(rng);
        let out = self.propagate(graph, h, &edges, rng)?;
        Ok((out, posterior))
    }

    /// Edge KL plus any Bayesian projection KL.
    pub fn kl_divergence(&self, posterior: &EdgePosterior) -> f64 {
        posterior.kl_divergence()
            + self.fc.kl_divergence()
            + self.fc_mu.kl_divergence()
            + self.fc_log_sigma.kl_divergence()
    }
}
