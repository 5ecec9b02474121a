//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for resilience
//! profiles. All types derive Serde traits for deserialization from config
//! files.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Root configuration: a set of named profiles plus selection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Environment variable consulted once to override the active profile.
    pub profile_env_var: String,

    /// Profile used when no override is set or the override is unknown.
    pub default_profile: String,

    /// Key prefix forwarded to distributed pool implementations.
    pub key_prefix: String,

    /// Named profiles.
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            profile_env_var: "RESILIENCE_PROFILE".to_string(),
            default_profile: "default".to_string(),
            key_prefix: "cb".to_string(),
            profiles: BTreeMap::new(),
        }
    }
}

/// A named bundle of pools, pipelines and the optional database binding.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Pool id -> pool settings.
    pub pools: BTreeMap<String, PoolConfig>,

    /// Pipeline name -> ordered stages.
    pub pipelines: BTreeMap<String, PipelineConfig>,

    /// Database driver wiring.
    pub database: DatabaseConfig,
}

/// How a pool divides its global capacity among lanes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMode {
    #[default]
    Fixed,
    Percent,
    Weighted,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::Fixed => "fixed",
            AllocationMode::Percent => "percent",
            AllocationMode::Weighted => "weighted",
        }
    }
}

impl std::fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bulkhead pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Total concurrency shared by every lane of the pool.
    pub global_max: i64,

    /// Lane allocation mode.
    #[serde(default)]
    pub mode: AllocationMode,

    /// Utilization above which lanes may borrow idle capacity.
    /// Forwarded untouched to the admission implementation.
    #[serde(default = "default_soft_borrow_threshold")]
    pub soft_borrow_utilization_threshold: f64,

    /// Lane name -> lane settings, in declaration order.
    #[serde(default)]
    pub lanes: IndexMap<String, LaneConfig>,
}

fn default_soft_borrow_threshold() -> f64 {
    0.5
}

/// Lane settings. Which field is read depends on the owning pool's mode.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Used in `fixed` mode.
    pub max_concurrent: Option<i64>,

    /// Used in `percent` mode, fraction of `global_max` in [0, 1].
    pub percent: Option<f64>,

    /// Used in `weighted` mode.
    pub weight: Option<i64>,
}

/// Ordered stage list for one pipeline.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub stages: Vec<StageConfig>,
}

/// Stage type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Bulkhead,
    CircuitBreaker,
    Retry,
}

/// A single stage declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    #[serde(rename = "type")]
    pub kind: StageKind,

    /// Pool id, required by `bulkhead` stages.
    #[serde(default)]
    pub pool: Option<String>,

    /// Circuit name forwarded to the circuit breaker collaborator.
    #[serde(default)]
    pub circuit_id: Option<String>,

    /// Retry settings, either a spec string or a settings table.
    #[serde(default)]
    pub retry: Option<RetryValue>,
}

/// Raw `retry` value of a stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RetryValue {
    /// Opaque retry spec, e.g. `rtry:attempts=3;delay=50ms`.
    Spec(String),
    /// Built-in exponential backoff settings.
    Settings(RetrySettings),
}

/// Built-in retry settings. Unset fields take documented defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: Option<i64>,
    pub base_delay_ms: Option<i64>,
    pub max_delay_ms: Option<i64>,
    pub jitter: Option<bool>,
}

/// Database driver wiring: which pipelines guard connects and queries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub enabled: bool,

    /// Name of the connection being wrapped.
    pub connection: String,

    /// Pipeline run around `connect`.
    pub connect_pipeline: Option<String>,

    /// Pipeline run around query and statement execution.
    pub query_pipeline: Option<String>,

    pub connect_lane: String,
    pub query_lane: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            connection: "default".to_string(),
            connect_pipeline: None,
            query_pipeline: None,
            connect_lane: "db.connect".to_string(),
            query_lane: "db.query".to_string(),
        }
    }
}
