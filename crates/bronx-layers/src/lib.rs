// ─────────────────────────────────────────────────────────────────────
// Bronx — Bayesian Graph Layers
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Message-passing layers with variational edge weights, plus the small
//! training utilities the external loop uses around them.

pub mod layer;
pub mod linear;
pub mod training;

pub use layer::{BronxLayer, BronxLayerConfig, EdgePosterior};
pub use linear::{normal_kl_to_standard, BayesianLinear, Dense, Linear};
pub use training::{weighted_cross_entropy_with_logits, EarlyStopping};
