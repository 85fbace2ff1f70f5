// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph Variational Gaussian Processes
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Sparse variational GP over graph nodes with a diffusion-smoothed prior.
//!
//! Architecture:
//!   - Kernel: diffusion slice Φ[X, Z], feature kernels, composite ⊙
//!   - VariationalParams: q(u) mean and per-latent Cholesky scale
//!   - graph_conditional: q(u) → q(f) at query nodes through Φ
//!   - Likelihood: Gaussian, softmax (Monte-Carlo), external closure
//!   - GraphVariationalSparseGp: prior / model / forward / guide entry points

pub mod conditional;
pub mod kernel;
pub mod likelihood;
pub mod model;
pub mod params;

pub use conditional::{graph_conditional, ConditionalOptions, GraphConditional, PredictiveCovariance};
pub use kernel::{
    CompositeKernel, Covariance, DiffusionKernel, Kernel, KernelInput, LinearKernel, RbfKernel,
};
pub use likelihood::{ExternalLikelihood, GaussianLikelihood, Likelihood, SoftmaxLikelihood, Targets};
pub use model::{
    accuracy, GraphVariationalSparseGp, InducingPrior, Mode, ModelTrace, TrainingData,
};
pub use params::VariationalParams;
