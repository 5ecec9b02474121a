//! Pool policy construction.
//!
//! # Responsibilities
//! - Validate each pool's `global_max` and soft borrow threshold
//! - Resolve lane limits through the lane allocation rules
//! - Emit one immutable [`PoolPolicy`] per pool, keyed by pool id
//!
//! No concurrency tokens are allocated here. A policy only carries the
//! parameters an admission implementation is constructed with.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::schema::{AllocationMode, PoolConfig};
use crate::profile::error::{BuildError, BuildResult};
use crate::profile::lanes::{allocate, lane_specs, LaneSpec};

/// Immutable admission parameters for one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolPolicy {
    id: String,
    global_max: u32,
    mode: AllocationMode,
    soft_borrow_threshold: f64,
    lanes: IndexMap<String, LaneSpec>,
    lane_limits: IndexMap<String, u32>,
}

impl PoolPolicy {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn global_max(&self) -> u32 {
        self.global_max
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    /// Opaque passthrough for the admission implementation.
    pub fn soft_borrow_threshold(&self) -> f64 {
        self.soft_borrow_threshold
    }

    /// Declared lane specs, in declaration order.
    pub fn lanes(&self) -> &IndexMap<String, LaneSpec> {
        &self.lanes
    }

    /// Effective limit of a configured lane.
    pub fn lane_limit(&self, lane: &str) -> Option<u32> {
        self.lane_limits.get(lane).copied()
    }

    /// Effective limits of all configured lanes.
    pub fn lane_limits(&self) -> &IndexMap<String, u32> {
        &self.lane_limits
    }
}

/// Build the policy for a single pool.
pub fn build_pool_policy(id: &str, config: &PoolConfig) -> BuildResult<PoolPolicy> {
    let global_max = u32::try_from(config.global_max)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| BuildError::InvalidGlobalMax {
            pool: id.to_string(),
            value: config.global_max,
        })?;

    let threshold = config.soft_borrow_utilization_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(BuildError::InvalidSoftBorrowThreshold {
            pool: id.to_string(),
            value: threshold.to_string(),
        });
    }

    let lanes = lane_specs(id, config.mode, &config.lanes)?;
    let lane_limits = allocate(global_max, &lanes);

    tracing::debug!(
        pool = %id,
        global_max,
        mode = %config.mode,
        lanes = ?lane_limits,
        "Pool policy built"
    );

    Ok(PoolPolicy {
        id: id.to_string(),
        global_max,
        mode: config.mode,
        soft_borrow_threshold: threshold,
        lanes,
        lane_limits,
    })
}

/// Build policies for every configured pool. Fails on the first invalid pool.
pub fn build_pool_policies(
    pools: &BTreeMap<String, PoolConfig>,
) -> BuildResult<BTreeMap<String, Arc<PoolPolicy>>> {
    pools
        .iter()
        .map(|(id, cfg)| Ok((id.clone(), Arc::new(build_pool_policy(id, cfg)?))))
        .collect()
}
