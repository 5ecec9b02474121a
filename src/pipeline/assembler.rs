//! Pipeline assembly.
//!
//! # Responsibilities
//! - Turn ordered stage declarations into [`PipelineDefinition`]s
//! - Resolve bulkhead pool references against built pool policies
//! - Resolve retry stages
//!
//! # Design Decisions
//! - Assembly is all-or-nothing: one bad stage aborts every pipeline
//! - Only order and validity are guaranteed here; running the chain is the
//!   executor's job (first stage outermost, each stage receives a
//!   continuation for the rest)

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::schema::{PipelineConfig, StageConfig, StageKind};
use crate::pipeline::retry::{resolve_retry, RetrySpecParser};
use crate::pipeline::stage::{PipelineDefinition, StageSpec};
use crate::profile::error::{BuildError, BuildResult};
use crate::profile::policy::PoolPolicy;

/// Assemble a single pipeline.
pub fn assemble_pipeline(
    name: &str,
    config: &PipelineConfig,
    pools: &BTreeMap<String, Arc<PoolPolicy>>,
    retry_parser: &dyn RetrySpecParser,
) -> BuildResult<PipelineDefinition> {
    let stages = config
        .stages
        .iter()
        .map(|stage| assemble_stage(name, stage, pools, retry_parser))
        .collect::<BuildResult<Vec<_>>>()?;

    tracing::debug!(
        pipeline = %name,
        stages = ?stages.iter().map(StageSpec::kind).collect::<Vec<_>>(),
        "Pipeline assembled"
    );

    Ok(PipelineDefinition::new(name, stages))
}

fn assemble_stage(
    pipeline: &str,
    stage: &StageConfig,
    pools: &BTreeMap<String, Arc<PoolPolicy>>,
    retry_parser: &dyn RetrySpecParser,
) -> BuildResult<StageSpec> {
    match stage.kind {
        StageKind::Bulkhead => {
            let pool_id = stage.pool.clone().unwrap_or_default();
            if !pools.contains_key(&pool_id) {
                return Err(BuildError::UnknownPool {
                    pipeline: pipeline.to_string(),
                    pool: pool_id,
                });
            }
            Ok(StageSpec::Bulkhead { pool_id })
        }
        StageKind::CircuitBreaker => Ok(StageSpec::CircuitBreaker {
            circuit_id: stage.circuit_id.clone(),
        }),
        StageKind::Retry => Ok(StageSpec::Retry {
            spec: resolve_retry(pipeline, stage.retry.as_ref(), retry_parser)?,
        }),
    }
}

/// Assemble every configured pipeline. Returns nothing on the first error.
pub fn assemble_pipelines(
    pipelines: &BTreeMap<String, PipelineConfig>,
    pools: &BTreeMap<String, Arc<PoolPolicy>>,
    retry_parser: &dyn RetrySpecParser,
) -> BuildResult<BTreeMap<String, PipelineDefinition>> {
    pipelines
        .iter()
        .map(|(name, cfg)| Ok((name.clone(), assemble_pipeline(name, cfg, pools, retry_parser)?)))
        .collect()
}
