// ─────────────────────────────────────────────────────────────────────
// Bronx — Graph Diffusion Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Configuration, error hierarchy, dense matrix storage and the
//! deterministic RNG shared by every Bronx crate.

pub mod config;
pub mod error;
pub mod matrix;
pub mod rng;

pub use config::BronxConfig;
pub use error::{BronxError, BronxResult};
pub use matrix::Matrix;
pub use rng::SimpleRng;
