// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph Diffusion Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Graph structure, dense linear algebra and the cached graph diffusion
//! operator Φ = exp(D⁻¹A − I).
//!
//! Architecture:
//!   - Graph: node count + parallel edge lists + content fingerprint
//!   - linalg: Cholesky, forward substitution, pivoted LU
//!   - expm: scaling-and-squaring Padé matrix exponential
//!   - cache: bounded LRU with interior mutability
//!   - GraphDiffusion: fingerprint-keyed operator cache (capacity 1 default)

pub mod cache;
pub mod diffusion;
pub mod expm;
pub mod graph;
pub mod linalg;

pub use cache::{CacheStats, LruCache};
pub use diffusion::{diffusion_generator, diffusion_operator, normalised_adjacency, GraphDiffusion};
pub use expm::matrix_exp;
pub use graph::Graph;
pub use linalg::{cholesky, log_diag_sum, lu_solve, solve_lower_triangular};
