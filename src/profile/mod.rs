//! Profile build subsystem.
//!
//! # Data Flow
//! ```text
//! ResilienceConfig
//!     → resolver.rs (pick active profile: override → default → stub)
//!     → policy.rs (one PoolPolicy per pool, lane limits from lanes.rs)
//!     → pipeline::assembler (ordered pipelines against the pool map)
//!     → builder.rs (ResilienceProfile, immutable, shared via Arc)
//! ```
//!
//! # Design Decisions
//! - One explicit build step; consumers receive the result, never look it up
//! - Build errors are fatal and surface before any traffic is served

pub mod builder;
pub mod error;
pub mod lanes;
pub mod policy;
pub mod resolver;

pub use builder::{DatabaseBinding, DatabaseRoute, ProfileBuilder, ResilienceProfile};
pub use error::{BuildError, BuildResult};
pub use lanes::LaneSpec;
pub use policy::PoolPolicy;
pub use resolver::{resolve_from_env, resolve_profile, ResolvedProfile};
