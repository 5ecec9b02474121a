//! Resilience pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! PipelineConfig (ordered stage declarations)
//!     → assembler.rs (resolve pool references)
//!     → retry.rs (resolve retry stages, validate spec strings)
//!     → PipelineDefinition (ordered, immutable)
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed at build time; the first stage is outermost
//! - Circuit breaking and retry execution are external collaborators; stages
//!   only name them

pub mod assembler;
pub mod retry;
pub mod stage;

pub use assembler::{assemble_pipeline, assemble_pipelines};
pub use retry::{resolve_retry, RetrySpecParser, RtrySpecParser};
pub use stage::{PipelineDefinition, RetrySpec, StageSpec};
