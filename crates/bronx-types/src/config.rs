// ─────────────────────────────────────────────────────────────────────
// Bronx — Runtime Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{BronxError, BronxResult};

/// Runtime configuration for the graph diffusion GP.
///
/// The core never owns a CLI or a file format; this is the subset of
/// knobs an external training loop hands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BronxConfig {
    /// Diagonal regulariser added before every Cholesky factorisation.
    /// Default: 1e-6.
    pub jitter: f64,

    /// Treat the inducing posterior as whitened.
    /// Default: false.
    pub whiten: bool,

    /// Return full predictive covariance instead of marginal variances.
    /// Default: false.
    pub full_cov: bool,

    /// Width of the learned feature projection W (features × hidden).
    /// Default: 16.
    pub hidden_features: usize,

    /// Standard deviation used to initialise W.
    /// Default: 1.0.
    pub init_std: f64,

    /// Number of diffusion operators kept alive at once.
    /// Default: 1 (switching graphs evicts the previous operator).
    pub diffusion_cache_capacity: usize,

    /// Number of memoised diffusion-kernel evaluations.
    /// Default: 8.
    pub kernel_cache_capacity: usize,

    /// Monte-Carlo draws for non-conjugate likelihoods.
    /// Default: 32.
    pub mc_samples: usize,

    /// Seed for projection init and Monte-Carlo draws.
    /// Default: 42.
    pub seed: u64,
}

impl Default for BronxConfig {
    fn default() -> Self {
        Self {
            jitter: 1e-6,
            whiten: false,
            full_cov: false,
            hidden_features: 16,
            init_std: 1.0,
            diffusion_cache_capacity: 1,
            kernel_cache_capacity: 8,
            mc_samples: 32,
            seed: 42,
        }
    }
}

impl BronxConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> BronxResult<()> {
        if !(self.jitter.is_finite() && self.jitter > 0.0) {
            return Err(BronxError::Config(format!(
                "jitter must be finite and > 0, got {}",
                self.jitter
            )));
        }
        if self.hidden_features < 1 {
            return Err(BronxError::Config(format!(
                "hidden_features must be >= 1, got {}",
                self.hidden_features
            )));
        }
        if !(self.init_std.is_finite() && self.init_std > 0.0) {
            return Err(BronxError::Config(format!(
                "init_std must be finite and > 0, got {}",
                self.init_std
            )));
        }
        if self.diffusion_cache_capacity < 1 {
            return Err(BronxError::Config(format!(
                "diffusion_cache_capacity must be >= 1, got {}",
                self.diffusion_cache_capacity
            )));
        }
        if self.kernel_cache_capacity < 1 {
            return Err(BronxError::Config(format!(
                "kernel_cache_capacity must be >= 1, got {}",
                self.kernel_cache_capacity
            )));
        }
        if self.mc_samples < 1 {
            return Err(BronxError::Config(format!(
                "mc_samples must be >= 1, got {}",
                self.mc_samples
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> BronxResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| BronxError::Config(format!("JSON parse error: {e}")))
    }

    /// Serialise to a JSON string.
    pub fn to_json(&self) -> BronxResult<String> {
        serde_json::to_string(self)
            .map_err(|e| BronxError::Config(format!("JSON encode error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BronxConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let cfg = BronxConfig::default();
        assert_eq!(cfg.jitter, 1e-6);
        assert!(!cfg.whiten);
        assert!(!cfg.full_cov);
        assert_eq!(cfg.diffusion_cache_capacity, 1);
        assert_eq!(cfg.kernel_cache_capacity, 8);
    }

    #[test]
    fn test_rejects_non_positive_jitter() {
        let cfg = BronxConfig {
            jitter: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BronxError::Config(_))));
        let cfg = BronxConfig {
            jitter: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let cfg = BronxConfig {
            diffusion_cache_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BronxConfig {
            kernel_cache_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = BronxConfig::from_json(r#"{"jitter": 1e-4, "hidden_features": 8}"#).unwrap();
        assert_eq!(cfg.jitter, 1e-4);
        assert_eq!(cfg.hidden_features, 8);
        assert_eq!(cfg.kernel_cache_capacity, 8);
    }

    #[test]
    fn test_json_roundtrip() {
        let cfg = BronxConfig {
            whiten: true,
            seed: 7,
            ..Default::default()
        };
        let back = BronxConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            BronxConfig::from_json("{not json"),
            Err(BronxError::Config(_))
        ));
    }
}
