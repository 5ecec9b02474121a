//! Per-operation admission control.
//!
//! # Data Flow
//! ```text
//! handler id ─→ tags.rs (cached ResourceTags)
//!                  │
//!                  ▼
//! lifecycle.rs ── acquire in order ─→ pool.rs (BulkheadPool) ─→ local.rs
//!      │
//!      └─ on_success / on_failure / drop ─→ release each permit once
//! ```

pub mod lifecycle;
pub mod local;
pub mod pool;
pub mod tags;

pub use lifecycle::{LifecycleState, OperationContext, OperationError, PermitLifecycleManager, DEFAULT_LANE};
pub use local::{LocalPermit, LocalPool};
pub use pool::{AdmissionError, BulkheadPool, Permit, PoolRegistry, RejectReason};
pub use tags::{parse_handler_markers, parse_markers, ResourceTag, TagFields, TagRegistry};
