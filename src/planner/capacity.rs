//! Per-level capacity schedule
//!
//! Level 0 is bounded by file count inside the engine, not by bytes, so its
//! capacity is reported as `None`. Level 1 holds `base_level_size` bytes and
//! every deeper level is `size_ratio` times the previous one.

use super::PlanError;

/// Inputs for [`plan_capacities`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityParams {
    /// Capacity of level 1 in bytes
    pub base_level_size: u64,
    /// Growth factor between consecutive levels
    pub size_ratio: f64,
    /// Number of levels including level 0
    pub level_count: usize,
}

impl CapacityParams {
    pub fn new(base_level_size: u64, size_ratio: f64, level_count: usize) -> Self {
        Self {
            base_level_size,
            size_ratio,
            level_count,
        }
    }

    /// Level 1 sized as `max_file_size * size_ratio`, the way LevelDB-style
    /// leveling is usually configured.
    pub fn from_file_size(max_file_size: u64, size_ratio: f64, level_count: usize) -> Self {
        let base = (max_file_size as f64 * size_ratio).round();
        let base_level_size = if base.is_finite() && base < u64::MAX as f64 {
            base as u64
        } else {
            u64::MAX
        };
        Self::new(base_level_size, size_ratio, level_count)
    }
}

/// Compute the target capacity of every level.
///
/// Returns `level_count` entries; entry 0 is `None` (unconstrained).
pub fn plan_capacities(
    base_level_size: u64,
    size_ratio: f64,
    level_count: usize,
) -> Result<Vec<Option<u64>>, PlanError> {
    if !size_ratio.is_finite() || size_ratio <= 1.0 {
        return Err(PlanError::InvalidSizeRatio(size_ratio));
    }
    if level_count == 0 {
        return Err(PlanError::InvalidLevelCount);
    }
    if base_level_size == 0 {
        return Err(PlanError::ZeroBaseLevel);
    }

    let mut capacities = Vec::with_capacity(level_count);
    capacities.push(None);

    let mut size = base_level_size;
    for level in 1..level_count {
        if level > 1 {
            let next = (size as f64 * size_ratio).round();
            // u64::MAX as f64 rounds up to 2^64, so `>=` catches overflow
            if next >= u64::MAX as f64 {
                return Err(PlanError::CapacityOverflow { level });
            }
            size = next as u64;
        }
        capacities.push(Some(size));
    }

    Ok(capacities)
}
