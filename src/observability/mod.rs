//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Build step and admission lifecycle produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//! ```
//!
//! # Design Decisions
//! - Structured logging via `tracing` fields, not formatted strings
//! - Metrics are cheap (facade calls, no-op without a recorder)

pub mod logging;
pub mod metrics;
