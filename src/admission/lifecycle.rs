//! Permit lifecycle per inbound operation.
//!
//! # States
//! ```text
//! NotStarted → Acquiring → Held → Released
//!                  │                  ▲
//!                  └──── failure ─────┘
//! ```
//!
//! # Responsibilities
//! - Resolve a handler's tags (cached) and acquire one permit per tag, in order
//! - Attach acquired permits to the operation's context
//! - Release every permit exactly once on success, failure, partial
//!   acquisition failure or cancellation
//!
//! # Design Decisions
//! - The context owns its permits; no locking is needed
//! - Releasing takes the permit list out of the context, so a second
//!   completion hook finds nothing to release
//! - Dropping a context releases whatever it still holds

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::mem;
use std::sync::Arc;

use crate::admission::pool::{AdmissionError, Permit, PoolRegistry};
use crate::admission::tags::TagRegistry;
use crate::observability::metrics;

/// Lane used when a tag names none and the operation has no route.
pub const DEFAULT_LANE: &str = "default";

/// Where an operation is in its admission lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No admission attempted yet, or the handler declares no tags.
    NotStarted,
    Acquiring,
    Held,
    Released,
}

/// Per-operation admission state. Owned by exactly one operation.
#[derive(Debug)]
pub struct OperationContext {
    handler: String,
    route: Option<String>,
    permits: Vec<Box<dyn Permit>>,
    state: LifecycleState,
}

impl OperationContext {
    /// Context for an operation targeting `handler`.
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            route: None,
            permits: Vec::new(),
            state: LifecycleState::NotStarted,
        }
    }

    /// Routing identifier used as the lane when a tag names none.
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Held permits, in acquisition order.
    pub fn permits(&self) -> &[Box<dyn Permit>] {
        &self.permits
    }

    /// `(pool, lane)` of every held permit.
    pub fn held_lanes(&self) -> Vec<(String, String)> {
        self.permits
            .iter()
            .map(|p| (p.pool().to_string(), p.lane().to_string()))
            .collect()
    }

    fn default_lane(&self) -> &str {
        self.route
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_LANE)
    }

    /// Release every held permit and return how many were released.
    ///
    /// Safe to call any number of times; later calls release nothing.
    pub fn release_permits(&mut self) -> usize {
        let permits = mem::take(&mut self.permits);
        if matches!(self.state, LifecycleState::Acquiring | LifecycleState::Held) {
            self.state = LifecycleState::Released;
        }

        let count = permits.len();
        for permit in permits {
            let pool = permit.pool().to_string();
            permit.release();
            metrics::record_permits_released(&pool, 1);
        }
        count
    }
}

impl Drop for OperationContext {
    fn drop(&mut self) {
        let released = self.release_permits();
        if released > 0 {
            tracing::debug!(
                handler = %self.handler,
                released,
                "Released permits of abandoned operation"
            );
        }
    }
}

/// Failure of an operation run under admission control.
#[derive(Debug)]
pub enum OperationError<E> {
    /// The operation was never started.
    Admission(AdmissionError),
    /// The operation ran and failed.
    Operation(E),
}

impl<E: fmt::Display> fmt::Display for OperationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Admission(e) => write!(f, "{}", e),
            OperationError::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E: StdError + 'static> StdError for OperationError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            OperationError::Admission(e) => Some(e),
            OperationError::Operation(e) => Some(e),
        }
    }
}

/// Acquires and releases permits around inbound operations.
#[derive(Debug, Clone)]
pub struct PermitLifecycleManager {
    pools: Arc<PoolRegistry>,
    tags: Arc<TagRegistry>,
}

impl PermitLifecycleManager {
    pub fn new(pools: Arc<PoolRegistry>, tags: Arc<TagRegistry>) -> Self {
        Self { pools, tags }
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Admit an operation: acquire one permit per declared tag, in order.
    ///
    /// Returns the number of permits acquired. On error nothing is held: any
    /// permits taken for earlier tags are released before returning. A
    /// context is admitted at most once; once it has left `NotStarted` it is
    /// left untouched.
    pub async fn begin(&self, ctx: &mut OperationContext) -> Result<usize, AdmissionError> {
        if ctx.state != LifecycleState::NotStarted {
            return Ok(0);
        }

        let tags = self.tags.resolve(ctx.handler());
        if tags.is_empty() {
            return Ok(0);
        }

        ctx.state = LifecycleState::Acquiring;
        for tag in tags.iter() {
            let lane = tag
                .lane
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| ctx.default_lane())
                .to_string();

            let Some(pool) = self.pools.get(&tag.pool) else {
                let released = ctx.release_permits();
                tracing::warn!(
                    handler = %ctx.handler,
                    pool = %tag.pool,
                    released,
                    "Unknown bulkhead pool requested"
                );
                metrics::record_admission_rejected(&tag.pool, "unknown_pool");
                return Err(AdmissionError::UnknownPool(tag.pool.clone()));
            };

            match pool.acquire(&lane, tag.timeout_duration()).await {
                Ok(permit) => {
                    tracing::debug!(
                        handler = %ctx.handler,
                        pool = %tag.pool,
                        lane = %lane,
                        permit = %permit.id(),
                        "Permit acquired"
                    );
                    metrics::record_permit_acquired(&tag.pool, &lane);
                    ctx.permits.push(permit);
                }
                Err(err) => {
                    let released = ctx.release_permits();
                    tracing::warn!(
                        handler = %ctx.handler,
                        pool = %tag.pool,
                        lane = %lane,
                        released,
                        error = %err,
                        "Admission rejected"
                    );
                    let reason = match &err {
                        AdmissionError::Rejected { reason, .. } => reason.as_str(),
                        AdmissionError::UnknownPool(_) => "unknown_pool",
                    };
                    metrics::record_admission_rejected(&tag.pool, reason);
                    return Err(err);
                }
            }
        }

        ctx.state = LifecycleState::Held;
        Ok(ctx.permits.len())
    }

    /// Completion hook for a successful operation.
    pub fn on_success(&self, ctx: &mut OperationContext) -> usize {
        self.complete(ctx, "success")
    }

    /// Completion hook for a failed operation.
    pub fn on_failure(&self, ctx: &mut OperationContext) -> usize {
        self.complete(ctx, "failure")
    }

    fn complete(&self, ctx: &mut OperationContext, outcome: &'static str) -> usize {
        let released = ctx.release_permits();
        if released > 0 {
            tracing::debug!(handler = %ctx.handler, outcome, released, "Permits released");
        }
        released
    }

    /// Run `operation` under admission control.
    ///
    /// The operation is only polled once every permit is held; the matching
    /// completion hook fires when it resolves. If the returned future is
    /// dropped early, the context's drop releases the permits.
    pub async fn run<Fut, T, E>(
        &self,
        mut ctx: OperationContext,
        operation: Fut,
    ) -> Result<T, OperationError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.begin(&mut ctx).await.map_err(OperationError::Admission)?;

        match operation.await {
            Ok(value) => {
                self.on_success(&mut ctx);
                Ok(value)
            }
            Err(err) => {
                self.on_failure(&mut ctx);
                Err(OperationError::Operation(err))
            }
        }
    }
}
