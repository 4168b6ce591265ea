//! Filter allocation strategies
//!
//! Every strategy receives the expected entry weight of each level (shallow
//! first) and the budget `B`, the average bits per entry over the whole
//! tree, and returns one bits-per-entry value per level such that
//! `Σ wᵢ·bᵢ = B·Σ wᵢ`.

use super::PlanError;

/// ln(2)², the exponent scale of a bloom filter's false positive rate:
/// `fpr ≈ exp(-bits_per_entry · ln²2)`.
const LN2_SQUARED: f64 = std::f64::consts::LN_2 * std::f64::consts::LN_2;

/// Hand-tuned per-level bits from early Monkey experiments.
pub const HAND_TUNED_BITS: [f64; 20] = [
    40.0, 35.0, 30.0, 25.0, 20.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0, 19.0, 1.0, 1.0,
    1.0, 1.0, 1.0, 1.0, 1.0,
];

/// A pluggable bits-per-entry allocation formula.
pub trait FilterAllocator: std::fmt::Debug {
    /// Short identifier, e.g. `"monkey"`
    fn name(&self) -> &'static str;

    /// Human-readable description of the active formula
    fn formula(&self) -> &'static str;

    /// Allocate bits per entry for each level. `weights` is non-empty and
    /// every weight is finite and > 0; `budget` is finite and >= 0.
    fn allocate(&self, weights: &[f64], budget: f64) -> Result<Vec<f64>, PlanError>;
}

/// Same bits for every level: the baseline LevelDB configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformAllocator;

impl FilterAllocator for UniformAllocator {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn formula(&self) -> &'static str {
        "b_i = B"
    }

    fn allocate(&self, weights: &[f64], budget: f64) -> Result<Vec<f64>, PlanError> {
        Ok(vec![budget; weights.len()])
    }
}

/// Closed form of the Monkey cost model.
///
/// Minimizing `Σ exp(-bᵢ·ln²2)` under `Σ wᵢ·bᵢ = B·W` gives
/// `bᵢ = C - ln(wᵢ)/ln²2`. Levels whose optimum falls below zero get no
/// filter and `C` is recomputed over the remaining levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonkeyAllocator;

impl FilterAllocator for MonkeyAllocator {
    fn name(&self) -> &'static str {
        "monkey"
    }

    fn formula(&self) -> &'static str {
        "b_i = max(0, C - ln(w_i)/ln^2(2)), C chosen so that sum(w_i*b_i) = B*sum(w_i)"
    }

    fn allocate(&self, weights: &[f64], budget: f64) -> Result<Vec<f64>, PlanError> {
        let total: f64 = weights.iter().sum();
        let target = budget * total;

        // Normalize so ln() stays small; the solution only depends on ratios.
        let max_w = weights.iter().cloned().fold(f64::MIN, f64::max);
        let scaled: Vec<f64> = weights.iter().map(|w| w / max_w).collect();
        let target_scaled = target / max_w;

        let mut active = vec![true; weights.len()];
        let mut bits = vec![0.0; weights.len()];

        loop {
            let active_weight: f64 = scaled
                .iter()
                .zip(&active)
                .filter(|(_, a)| **a)
                .map(|(w, _)| w)
                .sum();
            if active_weight == 0.0 {
                bits.iter_mut().for_each(|b| *b = 0.0);
                break;
            }

            let weighted_log: f64 = scaled
                .iter()
                .zip(&active)
                .filter(|(_, a)| **a)
                .map(|(w, _)| w * w.ln() / LN2_SQUARED)
                .sum();
            let c = (target_scaled + weighted_log) / active_weight;

            let mut dropped = false;
            for (i, w) in scaled.iter().enumerate() {
                if !active[i] {
                    bits[i] = 0.0;
                    continue;
                }
                let b = c - w.ln() / LN2_SQUARED;
                if b < 0.0 {
                    active[i] = false;
                    bits[i] = 0.0;
                    dropped = true;
                } else {
                    bits[i] = b;
                }
            }

            if !dropped {
                break;
            }
        }

        Ok(bits)
    }
}

/// Bits inversely proportional to each level's expected size.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseCapacityAllocator;

impl FilterAllocator for InverseCapacityAllocator {
    fn name(&self) -> &'static str {
        "inverse-capacity"
    }

    fn formula(&self) -> &'static str {
        "b_i = B*sum(w)/(L*w_i)"
    }

    fn allocate(&self, weights: &[f64], budget: f64) -> Result<Vec<f64>, PlanError> {
        let total: f64 = weights.iter().sum();
        let levels = weights.len() as f64;
        Ok(weights
            .iter()
            .map(|w| budget * total / (levels * w))
            .collect())
    }
}

/// The hand-tuned table's shape, rescaled so the tree-wide average matches
/// the budget.
#[derive(Debug, Clone)]
pub struct HandTunedAllocator {
    table: Vec<f64>,
}

impl HandTunedAllocator {
    pub fn new(table: Vec<f64>) -> Self {
        Self { table }
    }
}

impl Default for HandTunedAllocator {
    fn default() -> Self {
        Self::new(HAND_TUNED_BITS.to_vec())
    }
}

impl FilterAllocator for HandTunedAllocator {
    fn name(&self) -> &'static str {
        "hand-tuned"
    }

    fn formula(&self) -> &'static str {
        "b_i = table_i * B*sum(w)/sum(w_i*table_i)"
    }

    fn allocate(&self, weights: &[f64], budget: f64) -> Result<Vec<f64>, PlanError> {
        if weights.len() > self.table.len() {
            return Err(PlanError::TableTooShort {
                available: self.table.len(),
                requested: weights.len(),
            });
        }
        let shape = &self.table[..weights.len()];
        if let Some((level, &bits)) = shape
            .iter()
            .enumerate()
            .find(|(_, b)| !b.is_finite() || **b < 0.0)
        {
            return Err(PlanError::InvalidBits { level, bits });
        }

        let total: f64 = weights.iter().sum();
        let shaped: f64 = weights.iter().zip(shape).map(|(w, t)| w * t).sum();
        if shaped == 0.0 {
            return Ok(vec![0.0; weights.len()]);
        }
        let scale = budget * total / shaped;
        Ok(shape.iter().map(|t| t * scale).collect())
    }
}
