//! Build-time errors.

use thiserror::Error;

/// Fatal problems found while building a profile. Any of these aborts the
/// whole build; nothing is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A pool declared a non-positive `global_max`.
    #[error("Pool '{pool}': global_max must be >= 1, got {value}")]
    InvalidGlobalMax { pool: String, value: i64 },

    /// A lane setting is out of range for the pool's mode.
    #[error("Pool '{pool}', lane '{lane}': {reason}")]
    InvalidLane {
        pool: String,
        lane: String,
        reason: String,
    },

    /// `soft_borrow_utilization_threshold` outside [0, 1].
    #[error("Pool '{pool}': soft_borrow_utilization_threshold must be within [0, 1], got {value}")]
    InvalidSoftBorrowThreshold { pool: String, value: String },

    /// A bulkhead stage referenced a pool that is not configured.
    #[error("Unknown bulkhead pool id '{pool}' in pipeline '{pipeline}'")]
    UnknownPool { pipeline: String, pool: String },

    /// An opaque retry spec string failed to parse.
    #[error("Invalid retry spec '{spec}' in pipeline '{pipeline}': {reason}")]
    InvalidRetrySpec {
        pipeline: String,
        spec: String,
        reason: String,
    },

    /// Built-in retry settings violate their invariants.
    #[error("Invalid retry settings in pipeline '{pipeline}': {reason}")]
    InvalidRetrySettings { pipeline: String, reason: String },

    /// The database binding referenced a pipeline that is not configured.
    #[error("Unknown pipeline '{pipeline}' referenced by database {role} binding")]
    UnknownPipeline { role: &'static str, pipeline: String },
}

pub type BuildResult<T> = Result<T, BuildError>;
