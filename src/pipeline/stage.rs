//! Pipeline definitions.

use std::slice;

/// Retry settings carried by a retry stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrySpec {
    /// Built-in exponential backoff.
    Structured {
        max_attempts: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter: bool,
    },
    /// Opaque spec string, validated at build time and interpreted by the
    /// retry executor.
    External { spec: String },
}

impl Default for RetrySpec {
    fn default() -> Self {
        RetrySpec::Structured {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
            jitter: true,
        }
    }
}

/// One link of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSpec {
    /// Admission check against a configured pool.
    Bulkhead { pool_id: String },
    /// Guard by the process-wide circuit breaker, optionally naming a circuit.
    CircuitBreaker { circuit_id: Option<String> },
    Retry { spec: RetrySpec },
}

impl StageSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            StageSpec::Bulkhead { .. } => "bulkhead",
            StageSpec::CircuitBreaker { .. } => "circuit_breaker",
            StageSpec::Retry { .. } => "retry",
        }
    }
}

/// An ordered chain of stages. The first stage wraps all later ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    name: String,
    stages: Vec<StageSpec>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in declaration order, outermost first.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn outermost(&self) -> Option<&StageSpec> {
        self.stages.first()
    }

    pub fn iter(&self) -> slice::Iter<'_, StageSpec> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Pool ids referenced by bulkhead stages, in order.
    pub fn bulkhead_pools(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().filter_map(|stage| match stage {
            StageSpec::Bulkhead { pool_id } => Some(pool_id.as_str()),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a PipelineDefinition {
    type Item = &'a StageSpec;
    type IntoIter = slice::Iter<'a, StageSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
