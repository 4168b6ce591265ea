//! LevelSchedule: capacities plus filter bits for every level

use std::fmt;

use serde::Serialize;

use super::capacity::{plan_capacities, CapacityParams};
use super::strategy::{FilterAllocator, HAND_TUNED_BITS};
use super::{PlanError, BUDGET_TOLERANCE};

/// How the per-level filter bits are obtained
#[derive(Debug)]
pub enum FilterPlan {
    /// Caller-supplied bits, one per level; only non-negativity is checked
    Override(Vec<f64>),

    /// Distribute an average budget of `budget_bits` per entry
    Derived {
        budget_bits: f64,
        allocator: Box<dyn FilterAllocator>,
    },
}

impl FilterPlan {
    pub fn derived(budget_bits: f64, allocator: impl FilterAllocator + 'static) -> Self {
        FilterPlan::Derived {
            budget_bits,
            allocator: Box::new(allocator),
        }
    }

    /// Override with the first `level_count` entries of [`HAND_TUNED_BITS`].
    pub fn hand_tuned_table(level_count: usize) -> Result<Self, PlanError> {
        if level_count > HAND_TUNED_BITS.len() {
            return Err(PlanError::TableTooShort {
                available: HAND_TUNED_BITS.len(),
                requested: level_count,
            });
        }
        Ok(FilterPlan::Override(HAND_TUNED_BITS[..level_count].to_vec()))
    }
}

/// Result of [`plan_filter_bits`]
#[derive(Debug, Clone, PartialEq)]
pub struct FilterAllocation {
    pub bits: Vec<f64>,
    pub strategy: &'static str,
    pub formula: &'static str,
}

/// Expected entry share of each level.
///
/// Deeper levels are weighted by capacity. Level 0 has no byte capacity, so
/// it is weighted as one step below level 1.
pub fn expected_weights(capacities: &[Option<u64>], size_ratio: f64) -> Vec<f64> {
    let level1 = capacities.get(1).copied().flatten();
    capacities
        .iter()
        .map(|cap| match cap {
            Some(bytes) => *bytes as f64,
            None => match level1 {
                Some(l1) => l1 as f64 / size_ratio,
                // single-level tree: only relative weights matter
                None => 1.0,
            },
        })
        .collect()
}

/// Compute bits per entry for every level.
pub fn plan_filter_bits(
    capacities: &[Option<u64>],
    size_ratio: f64,
    plan: &FilterPlan,
) -> Result<FilterAllocation, PlanError> {
    if capacities.is_empty() {
        return Err(PlanError::InvalidLevelCount);
    }

    match plan {
        FilterPlan::Override(bits) => {
            if bits.len() != capacities.len() {
                return Err(PlanError::LengthMismatch {
                    expected: capacities.len(),
                    actual: bits.len(),
                });
            }
            check_non_negative(bits)?;
            Ok(FilterAllocation {
                bits: bits.clone(),
                strategy: "override",
                formula: "b_i = supplied",
            })
        }
        FilterPlan::Derived {
            budget_bits,
            allocator,
        } => {
            let budget = *budget_bits;
            if !budget.is_finite() || budget < 0.0 {
                return Err(PlanError::InvalidBudget(budget));
            }

            let weights = expected_weights(capacities, size_ratio);
            let bits = allocator.allocate(&weights, budget)?;
            if bits.len() != weights.len() {
                return Err(PlanError::LengthMismatch {
                    expected: weights.len(),
                    actual: bits.len(),
                });
            }

            check_non_negative(&bits)?;
            check_budget(&weights, &bits, budget)?;
            check_monotonic(&bits)?;

            Ok(FilterAllocation {
                bits,
                strategy: allocator.name(),
                formula: allocator.formula(),
            })
        }
    }
}

fn check_non_negative(bits: &[f64]) -> Result<(), PlanError> {
    match bits
        .iter()
        .enumerate()
        .find(|(_, b)| !b.is_finite() || **b < 0.0)
    {
        Some((level, &bits)) => Err(PlanError::InvalidBits { level, bits }),
        None => Ok(()),
    }
}

fn check_budget(weights: &[f64], bits: &[f64], budget: f64) -> Result<(), PlanError> {
    let actual = weighted_average(weights, bits);
    if (actual - budget).abs() > BUDGET_TOLERANCE * budget.max(1.0) {
        return Err(PlanError::BudgetMismatch {
            expected: budget,
            actual,
        });
    }
    Ok(())
}

fn check_monotonic(bits: &[f64]) -> Result<(), PlanError> {
    for (level, pair) in bits.windows(2).enumerate() {
        if pair[1] > pair[0] + 1e-9 {
            return Err(PlanError::NotMonotonic {
                level: level + 1,
                previous: pair[0],
                bits: pair[1],
            });
        }
    }
    Ok(())
}

fn weighted_average(weights: &[f64], bits: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    weights.iter().zip(bits).map(|(w, b)| w * b).sum::<f64>() / total
}

/// One level of a [`LevelSchedule`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelPlan {
    pub level: usize,
    /// `None` for level 0, which is bounded by file count instead
    pub capacity_bytes: Option<u64>,
    pub filter_bits_per_entry: f64,
}

/// Immutable per-level plan for one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSchedule {
    levels: Vec<LevelPlan>,
    size_ratio: f64,
    strategy: &'static str,
    formula: &'static str,
}

impl LevelSchedule {
    /// Plan capacities and filter bits in one go.
    pub fn plan(params: CapacityParams, filter: &FilterPlan) -> Result<Self, PlanError> {
        let capacities =
            plan_capacities(params.base_level_size, params.size_ratio, params.level_count)?;
        let allocation = plan_filter_bits(&capacities, params.size_ratio, filter)?;

        let levels = capacities
            .into_iter()
            .zip(allocation.bits)
            .enumerate()
            .map(|(level, (capacity_bytes, filter_bits_per_entry))| LevelPlan {
                level,
                capacity_bytes,
                filter_bits_per_entry,
            })
            .collect();

        Ok(Self {
            levels,
            size_ratio: params.size_ratio,
            strategy: allocation.strategy,
            formula: allocation.formula,
        })
    }

    pub fn levels(&self) -> &[LevelPlan] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn size_ratio(&self) -> f64 {
        self.size_ratio
    }

    pub fn capacities(&self) -> Vec<Option<u64>> {
        self.levels.iter().map(|l| l.capacity_bytes).collect()
    }

    pub fn filter_bits(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.filter_bits_per_entry).collect()
    }

    /// Name of the strategy that produced the filter bits
    pub fn strategy_name(&self) -> &'static str {
        self.strategy
    }

    /// Formula of the strategy that produced the filter bits
    pub fn formula(&self) -> &'static str {
        self.formula
    }

    pub fn expected_weights(&self) -> Vec<f64> {
        expected_weights(&self.capacities(), self.size_ratio)
    }

    /// Average bits per entry if every level were filled to its weight
    pub fn weighted_average_bits(&self) -> f64 {
        weighted_average(&self.expected_weights(), &self.filter_bits())
    }
}

impl fmt::Display for LevelSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "strategy: {} ({})", self.strategy, self.formula)?;
        writeln!(f, "Level   Capacity(MB)  Bits/Entry")?;
        writeln!(f, "--------------------------------")?;
        for level in &self.levels {
            match level.capacity_bytes {
                Some(bytes) => writeln!(
                    f,
                    "{:>5} {:>14.1} {:>11.2}",
                    level.level,
                    bytes as f64 / 1048576.0,
                    level.filter_bits_per_entry
                )?,
                None => writeln!(
                    f,
                    "{:>5} {:>14} {:>11.2}",
                    level.level, "-", level.filter_bits_per_entry
                )?,
            }
        }
        write!(f, "weighted average: {:.2}", self.weighted_average_bits())
    }
}
