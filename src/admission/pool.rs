//! Bulkhead pool contract.
//!
//! # Responsibilities
//! - Define the acquire/release protocol pools implement
//! - Define per-operation admission errors
//! - Map pool ids to pool handles (built once, read concurrently)
//!
//! # Design Decisions
//! - `acquire` may wait up to its timeout; `None` waits indefinitely
//! - Releasing consumes the permit, so one permit is released at most once
//! - Release never blocks and never fails

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::admission::local::LocalPool;
use crate::profile::builder::ResilienceProfile;

/// Why a pool refused a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The timeout elapsed before capacity became available.
    Timeout,
    /// The lane has no capacity at all.
    Exhausted,
    /// The pool was shut down.
    Closed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Timeout => "timeout",
            RejectReason::Exhausted => "exhausted",
            RejectReason::Closed => "closed",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation admission failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// A tag named a pool that is not registered.
    #[error("Unknown bulkhead pool id: {0}")]
    UnknownPool(String),

    /// The pool or lane had no capacity in time.
    #[error("Admission rejected by pool '{pool}' lane '{lane}': {reason}")]
    Rejected {
        pool: String,
        lane: String,
        reason: RejectReason,
    },
}

impl AdmissionError {
    pub fn rejected(pool: &str, lane: &str, reason: RejectReason) -> Self {
        AdmissionError::Rejected {
            pool: pool.to_string(),
            lane: lane.to_string(),
            reason,
        }
    }
}

/// One unit of pool/lane capacity held by an operation.
pub trait Permit: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn pool(&self) -> &str;
    fn lane(&self) -> &str;

    /// Return the capacity to the issuing pool.
    fn release(self: Box<Self>);
}

/// A named capacity budget shared across operations.
#[async_trait]
pub trait BulkheadPool: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Acquire one permit on `lane`, waiting up to `timeout`.
    async fn acquire(
        &self,
        lane: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Permit>, AdmissionError>;
}

/// Pool id -> pool handle.
#[derive(Debug, Clone, Default)]
pub struct PoolRegistry {
    pools: HashMap<String, Arc<dyn BulkheadPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one in-process pool per policy of the profile.
    pub fn local(profile: &ResilienceProfile) -> Self {
        let mut registry = Self::new();
        for policy in profile.pools().values() {
            registry.insert(Arc::new(LocalPool::new(policy.clone())));
        }
        registry
    }

    /// Register a pool under its own id, replacing any previous handle.
    pub fn insert(&mut self, pool: Arc<dyn BulkheadPool>) {
        self.pools.insert(pool.id().to_string(), pool);
    }

    pub fn with_pool(mut self, pool: Arc<dyn BulkheadPool>) -> Self {
        self.insert(pool);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn BulkheadPool>> {
        self.pools.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pools.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
