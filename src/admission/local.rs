//! In-process bulkhead pool.
//!
//! # Responsibilities
//! - Enforce a pool's `global_max` and per-lane limits within one process
//! - Issue permits that return capacity when released or dropped
//!
//! # Design Decisions
//! - One semaphore for the pool, one per configured lane
//! - Lane capacity is taken before global capacity, always in that order
//! - Lanes missing from the policy are bounded by `global_max` only
//! - A lane whose limit is 0 rejects immediately instead of waiting forever
//! - The soft borrow threshold is kept on the policy but not acted on here;
//!   borrowing belongs to distributed implementations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::admission::pool::{AdmissionError, BulkheadPool, Permit, RejectReason};
use crate::profile::policy::PoolPolicy;

/// A bulkhead pool backed by Tokio semaphores.
#[derive(Debug)]
pub struct LocalPool {
    policy: Arc<PoolPolicy>,
    global: Arc<Semaphore>,
    lanes: HashMap<String, Arc<Semaphore>>,
}

impl LocalPool {
    /// Create a pool sized by the policy.
    pub fn new(policy: Arc<PoolPolicy>) -> Self {
        let global = Arc::new(Semaphore::new(policy.global_max() as usize));
        let lanes = policy
            .lane_limits()
            .iter()
            .map(|(lane, limit)| (lane.clone(), Arc::new(Semaphore::new(*limit as usize))))
            .collect();

        Self {
            policy,
            global,
            lanes,
        }
    }

    pub fn policy(&self) -> &PoolPolicy {
        &self.policy
    }

    /// Unused global capacity.
    pub fn available(&self) -> usize {
        self.global.available_permits()
    }

    /// Unused capacity of a configured lane.
    pub fn lane_available(&self, lane: &str) -> Option<usize> {
        self.lanes.get(lane).map(|s| s.available_permits())
    }

    /// Reject all pending and future acquisitions.
    pub fn close(&self) {
        self.global.close();
        for lane in self.lanes.values() {
            lane.close();
        }
    }
}

#[async_trait]
impl BulkheadPool for LocalPool {
    fn id(&self) -> &str {
        self.policy.id()
    }

    async fn acquire(
        &self,
        lane: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Permit>, AdmissionError> {
        let pool_id = self.policy.id();
        if self.policy.lane_limit(lane) == Some(0) {
            return Err(AdmissionError::rejected(pool_id, lane, RejectReason::Exhausted));
        }

        let lane_semaphore = self.lanes.get(lane).cloned();
        if lane_semaphore.is_none() {
            tracing::trace!(pool = %pool_id, lane = %lane, "Lane not configured, global limit only");
        }

        let global = self.global.clone();
        let acquire = async move {
            let lane_permit = match lane_semaphore {
                Some(semaphore) => Some(semaphore.acquire_owned().await?),
                None => None,
            };
            let global_permit = global.acquire_owned().await?;
            Ok::<_, tokio::sync::AcquireError>((lane_permit, global_permit))
        };

        let acquired = match timeout {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| AdmissionError::rejected(pool_id, lane, RejectReason::Timeout))?,
            None => acquire.await,
        };
        let (lane_permit, global_permit) =
            acquired.map_err(|_| AdmissionError::rejected(pool_id, lane, RejectReason::Closed))?;

        Ok(Box::new(LocalPermit {
            id: Uuid::new_v4().to_string(),
            pool: pool_id.to_string(),
            lane: lane.to_string(),
            _lane_permit: lane_permit,
            _global_permit: global_permit,
        }))
    }
}

/// Capacity held in a [`LocalPool`]. Returned when released or dropped.
#[derive(Debug)]
pub struct LocalPermit {
    id: String,
    pool: String,
    lane: String,
    _lane_permit: Option<OwnedSemaphorePermit>,
    _global_permit: OwnedSemaphorePermit,
}

impl Permit for LocalPermit {
    fn id(&self) -> &str {
        &self.id
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn lane(&self) -> &str {
        &self.lane
    }

    fn release(self: Box<Self>) {
        tracing::trace!(permit = %self.id, pool = %self.pool, lane = %self.lane, "Permit released");
    }
}
