//! HTTP host integration.
//!
//! # Data Flow
//! ```text
//! Request
//!     → middleware.rs (matched route → handler identity + lane default)
//!     → PermitLifecycleManager::begin (503 / 500 on refusal)
//!     → handler (AdmittedLanes in extensions)
//!     → on_failure for 5xx, on_success otherwise
//! ```

pub mod middleware;

pub use middleware::{bulkhead_middleware, AdmittedLanes};
