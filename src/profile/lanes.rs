//! Lane allocation.
//!
//! # Responsibilities
//! - Select each lane's spec variant from the owning pool's mode
//! - Compute each lane's effective concurrency limit
//!
//! # Rules
//! ```text
//! fixed:    limit = max_concurrent                      (default 1)
//! percent:  limit = round(global_max × percent)         (default 0.1)
//! weighted: limit = round(global_max × weight / Σweight) (default 1)
//! ```
//!
//! # Design Decisions
//! - Rounding is to nearest, halves away from zero (`f64::round`)
//! - No clamping: a lane rounding to 0 admits nothing
//! - Percents are not required to sum to 1; lanes may oversubscribe and
//!   compete for the pool's global capacity at runtime
//! - Limits are recomputed from the full lane set on every build

use indexmap::IndexMap;

use crate::config::schema::{AllocationMode, LaneConfig};
use crate::profile::error::{BuildError, BuildResult};

const DEFAULT_MAX_CONCURRENT: u32 = 1;
const DEFAULT_PERCENT: f64 = 0.1;
const DEFAULT_WEIGHT: u32 = 1;

/// A lane's declared share, typed by the pool's mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneSpec {
    Fixed { max_concurrent: u32 },
    Percent { fraction: f64 },
    Weighted { weight: u32 },
}

impl LaneSpec {
    /// Select the variant for `mode` from raw lane settings, applying
    /// defaults for unset fields. Set but out-of-range values are errors.
    pub fn from_config(
        pool: &str,
        lane: &str,
        mode: AllocationMode,
        config: &LaneConfig,
    ) -> BuildResult<Self> {
        let invalid = |reason: String| BuildError::InvalidLane {
            pool: pool.to_string(),
            lane: lane.to_string(),
            reason,
        };

        match mode {
            AllocationMode::Fixed => {
                let max_concurrent = match config.max_concurrent {
                    None => DEFAULT_MAX_CONCURRENT,
                    Some(v) => positive_u32(v)
                        .ok_or_else(|| invalid(format!("max_concurrent must be >= 1, got {}", v)))?,
                };
                Ok(LaneSpec::Fixed { max_concurrent })
            }
            AllocationMode::Percent => {
                let fraction = config.percent.unwrap_or(DEFAULT_PERCENT);
                if !(0.0..=1.0).contains(&fraction) {
                    return Err(invalid(format!("percent must be within [0, 1], got {}", fraction)));
                }
                Ok(LaneSpec::Percent { fraction })
            }
            AllocationMode::Weighted => {
                let weight = match config.weight {
                    None => DEFAULT_WEIGHT,
                    Some(v) => positive_u32(v)
                        .ok_or_else(|| invalid(format!("weight must be >= 1, got {}", v)))?,
                };
                Ok(LaneSpec::Weighted { weight })
            }
        }
    }
}

fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v >= 1)
}

/// Build typed lane specs for every configured lane of a pool, in
/// declaration order.
pub fn lane_specs(
    pool: &str,
    mode: AllocationMode,
    lanes: &IndexMap<String, LaneConfig>,
) -> BuildResult<IndexMap<String, LaneSpec>> {
    lanes
        .iter()
        .map(|(name, cfg)| Ok((name.clone(), LaneSpec::from_config(pool, name, mode, cfg)?)))
        .collect()
}

/// Compute the effective limit of every lane.
pub fn allocate(global_max: u32, specs: &IndexMap<String, LaneSpec>) -> IndexMap<String, u32> {
    let total_weight: u64 = specs
        .values()
        .map(|spec| match spec {
            LaneSpec::Weighted { weight } => u64::from(*weight),
            _ => 0,
        })
        .sum();

    specs
        .iter()
        .map(|(name, spec)| {
            let limit = match *spec {
                LaneSpec::Fixed { max_concurrent } => max_concurrent,
                LaneSpec::Percent { fraction } => round_limit(f64::from(global_max) * fraction),
                LaneSpec::Weighted { weight } => {
                    if total_weight == 0 {
                        0
                    } else {
                        round_limit(
                            f64::from(global_max) * f64::from(weight) / total_weight as f64,
                        )
                    }
                }
            };
            (name.clone(), limit)
        })
        .collect()
}

fn round_limit(value: f64) -> u32 {
    let rounded = value.round();
    if rounded <= 0.0 || !rounded.is_finite() {
        0
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}
