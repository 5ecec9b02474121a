//! Resilience profiles: per-pool concurrency budgets, ordered resilience
//! pipelines and per-operation permit admission.

pub mod admission;
pub mod config;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod profile;

pub use admission::{OperationContext, PermitLifecycleManager, PoolRegistry, TagRegistry};
pub use config::ResilienceConfig;
pub use profile::{ProfileBuilder, ResilienceProfile};
