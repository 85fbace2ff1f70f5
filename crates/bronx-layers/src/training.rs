// ─────────────────────────────────────────────────────────────────────
// Bronx — Training Utilities
// Mirrors: bronx/utils.py
// ─────────────────────────────────────────────────────────────────────
//! Early stopping over several tracked losses and a numerically stable
//! weighted logistic loss.

use bronx_types::{BronxError, BronxResult};

/// Patience-based early stopping on a vector of losses.
///
/// Improving (≤) any tracked loss resets the counter; improving all of
/// them also snapshots the parameters. `step` reports `true` once
/// `patience` consecutive calls brought no improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping<P> {
    patience: usize,
    counter: usize,
    best_losses: Option<Vec<f64>>,
    best_params: Option<P>,
}

impl<P: Clone> EarlyStopping<P> {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            counter: 0,
            best_losses: None,
            best_params: None,
        }
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn best_losses(&self) -> Option<&[f64]> {
        self.best_losses.as_deref()
    }

    /// Parameters from the last step that improved every loss.
    pub fn best_params(&self) -> Option<&P> {
        self.best_params.as_ref()
    }

    pub fn step(&mut self, losses: &[f64], params: &P) -> BronxResult<bool> {
        let best = match &mut self.best_losses {
            None => {
                self.best_losses = Some(losses.to_vec());
                self.best_params = Some(params.clone());
                self.counter = 0;
                return Ok(false);
            }
            Some(best) => best,
        };
        if best.len() != losses.len() {
            return Err(BronxError::Shape(format!(
                "tracking {} losses, got {}",
                best.len(),
                losses.len()
            )));
        }

        let improved_any = losses.iter().zip(best.iter()).any(|(l, b)| l <= b);
        if improved_any {
            if losses.iter().zip(best.iter()).all(|(l, b)| l <= b) {
                self.best_params = Some(params.clone());
            }
            for (b, &l) in best.iter_mut().zip(losses) {
                *b = b.min(l);
            }
            self.counter = 0;
            return Ok(false);
        }

        self.counter += 1;
        if self.counter >= self.patience {
            log::debug!(
                "early stopping after {} steps without improvement",
                self.counter
            );
            return Ok(true);
        }
        Ok(false)
    }
}

/// Element-wise logistic loss with logits, scaling positive targets by
/// `pos_weight`:
///
/// `(1 − y)·x + (1 + (w − 1)·y)·(log(1 + e^{−|x|}) + max(−x, 0))`
pub fn weighted_cross_entropy_with_logits(
    labels: &[f64],
    logits: &[f64],
    pos_weight: f64,
) -> BronxResult<Vec<f64>> {
    if labels.len() != logits.len() {
        return Err(BronxError::Shape(format!(
            "{} labels for {} logits",
            labels.len(),
            logits.len()
        )));
    }
    Ok(labels
        .iter()
        .zip(logits)
        .map(|(&y, &x)| {
            let log_weight = 1.0 + (pos_weight - 1.0) * y;
            let softplus_neg = (-x.abs()).exp().ln_1p() + (-x).max(0.0);
            (1.0 - y) * x + log_weight * softplus_neg
        })
        .collect())
}
