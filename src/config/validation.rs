//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lane percents, weights, thresholds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Cross references (bulkhead pools, database pipelines) and `global_max`
//!   are checked by the profile build, which owns those invariants

use thiserror::Error;

use crate::config::schema::ResilienceConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("profile '{profile}', pool '{pool}': soft_borrow_utilization_threshold {value} must be within [0, 1]")]
    SoftBorrowThreshold { profile: String, pool: String, value: f64 },

    #[error("profile '{profile}', pool '{pool}', lane '{lane}': max_concurrent {value} must be >= 1")]
    LaneMaxConcurrent { profile: String, pool: String, lane: String, value: i64 },

    #[error("profile '{profile}', pool '{pool}', lane '{lane}': percent {value} must be within [0, 1]")]
    LanePercent { profile: String, pool: String, lane: String, value: f64 },

    #[error("profile '{profile}', pool '{pool}', lane '{lane}': weight {value} must be >= 1")]
    LaneWeight { profile: String, pool: String, lane: String, value: i64 },
}

/// Validate every profile of the configuration.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (profile, profile_cfg) in &config.profiles {
        for (pool, pool_cfg) in &profile_cfg.pools {
            let threshold = pool_cfg.soft_borrow_utilization_threshold;
            if !(0.0..=1.0).contains(&threshold) {
                errors.push(ValidationError::SoftBorrowThreshold {
                    profile: profile.clone(),
                    pool: pool.clone(),
                    value: threshold,
                });
            }

            for (lane, lane_cfg) in &pool_cfg.lanes {
                if let Some(value) = lane_cfg.max_concurrent.filter(|v| *v < 1) {
                    errors.push(ValidationError::LaneMaxConcurrent {
                        profile: profile.clone(),
                        pool: pool.clone(),
                        lane: lane.clone(),
                        value,
                    });
                }
                if let Some(value) = lane_cfg.percent.filter(|v| !(0.0..=1.0).contains(v)) {
                    errors.push(ValidationError::LanePercent {
                        profile: profile.clone(),
                        pool: pool.clone(),
                        lane: lane.clone(),
                        value,
                    });
                }
                if let Some(value) = lane_cfg.weight.filter(|v| *v < 1) {
                    errors.push(ValidationError::LaneWeight {
                        profile: profile.clone(),
                        pool: pool.clone(),
                        lane: lane.clone(),
                        value,
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
