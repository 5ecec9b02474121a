//! Profile build step.
//!
//! Produces the immutable object graph the rest of the process reads:
//! pool policies, pipelines and the database binding of the active profile.
//! Built once at startup and shared via `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::schema::{DatabaseConfig, ResilienceConfig};
use crate::observability::metrics;
use crate::pipeline::assembler::assemble_pipelines;
use crate::pipeline::retry::{RetrySpecParser, RtrySpecParser};
use crate::pipeline::stage::PipelineDefinition;
use crate::profile::error::{BuildError, BuildResult};
use crate::profile::policy::{build_pool_policies, PoolPolicy};
use crate::profile::resolver::{resolve_from_env, resolve_profile, ResolvedProfile};

/// Pipeline and lane used for one kind of database operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRoute {
    /// Pipeline to run the operation through; `None` runs it unguarded.
    pub pipeline: Option<String>,
    pub lane: String,
}

/// Resolved database driver wiring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseBinding {
    pub connection: String,
    pub connect: DatabaseRoute,
    /// Used for direct queries, exec and prepared statement execution.
    pub query: DatabaseRoute,
}

impl DatabaseBinding {
    fn resolve(
        config: &DatabaseConfig,
        pipelines: &BTreeMap<String, PipelineDefinition>,
    ) -> BuildResult<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let check = |role: &'static str, name: &Option<String>| -> BuildResult<Option<String>> {
            match name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                Some(n) if pipelines.contains_key(n) => Ok(Some(n.to_string())),
                Some(n) => Err(BuildError::UnknownPipeline {
                    role,
                    pipeline: n.to_string(),
                }),
                None => Ok(None),
            }
        };

        Ok(Some(Self {
            connection: config.connection.clone(),
            connect: DatabaseRoute {
                pipeline: check("connect", &config.connect_pipeline)?,
                lane: config.connect_lane.clone(),
            },
            query: DatabaseRoute {
                pipeline: check("query", &config.query_pipeline)?,
                lane: config.query_lane.clone(),
            },
        }))
    }
}

/// The built, read-only profile.
#[derive(Debug, Clone)]
pub struct ResilienceProfile {
    name: String,
    key_prefix: String,
    pools: BTreeMap<String, Arc<PoolPolicy>>,
    pipelines: BTreeMap<String, PipelineDefinition>,
    database: Option<DatabaseBinding>,
}

impl ResilienceProfile {
    /// Build the profile selected by the configured environment variable,
    /// validating retry specs with [`RtrySpecParser`].
    pub fn from_env(config: &ResilienceConfig) -> BuildResult<Self> {
        ProfileBuilder::new(config).build()
    }

    /// Name of the active profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn pool(&self, id: &str) -> Option<&Arc<PoolPolicy>> {
        self.pools.get(id)
    }

    pub fn pools(&self) -> &BTreeMap<String, Arc<PoolPolicy>> {
        &self.pools
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.get(name)
    }

    pub fn pipelines(&self) -> &BTreeMap<String, PipelineDefinition> {
        &self.pipelines
    }

    pub fn database(&self) -> Option<&DatabaseBinding> {
        self.database.as_ref()
    }
}

/// Builder for [`ResilienceProfile`].
pub struct ProfileBuilder<'a> {
    config: &'a ResilienceConfig,
    profile_override: Option<Option<String>>,
    retry_parser: Box<dyn RetrySpecParser + 'a>,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(config: &'a ResilienceConfig) -> Self {
        Self {
            config,
            profile_override: None,
            retry_parser: Box::new(RtrySpecParser),
        }
    }

    /// Use this override instead of reading the environment.
    pub fn profile_override(mut self, name: Option<&str>) -> Self {
        self.profile_override = Some(name.map(str::to_string));
        self
    }

    /// Validate opaque retry specs with a different parser.
    pub fn retry_parser(mut self, parser: impl RetrySpecParser + 'a) -> Self {
        self.retry_parser = Box::new(parser);
        self
    }

    pub fn build(self) -> BuildResult<ResilienceProfile> {
        let resolved = match &self.profile_override {
            Some(name) => resolve_profile(
                &self.config.profiles,
                name.as_deref(),
                &self.config.default_profile,
            ),
            None => resolve_from_env(self.config),
        };

        self.build_resolved(resolved)
    }

    fn build_resolved(self, resolved: ResolvedProfile) -> BuildResult<ResilienceProfile> {
        let ResolvedProfile { name, config, is_stub } = resolved;

        let pools = build_pool_policies(&config.pools)?;
        let pipelines = assemble_pipelines(&config.pipelines, &pools, self.retry_parser.as_ref())?;
        let database = DatabaseBinding::resolve(&config.database, &pipelines)?;

        tracing::info!(
            profile = %name,
            stub = is_stub,
            pools = pools.len(),
            pipelines = pipelines.len(),
            database = database.is_some(),
            "Resilience profile built"
        );
        metrics::record_profile_built(pools.len(), pipelines.len());

        Ok(ResilienceProfile {
            name,
            key_prefix: self.config.key_prefix.clone(),
            pools,
            pipelines,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
        key_prefix = "svc"

        [profiles.default.pools.db-main]
        global_max = 10
        [profiles.default.pools.db-main.lanes."db.connect"]
        max_concurrent = 2

        [[profiles.default.pipelines.connect.stages]]
        type = "circuit_breaker"
        [[profiles.default.pipelines.connect.stages]]
        type = "bulkhead"
        pool = "db-main"

        [profiles.default.database]
        enabled = true
        connect_pipeline = "connect"

        [profiles.small.pools.db-main]
        global_max = 1
    "#;

    #[test]
    fn test_builds_default_profile() {
        let config = parse_config(CONFIG).unwrap();
        let profile = ProfileBuilder::new(&config).profile_override(None).build().unwrap();

        assert_eq!(profile.name(), "default");
        assert_eq!(profile.key_prefix(), "svc");
        assert_eq!(profile.pool("db-main").unwrap().lane_limit("db.connect"), Some(2));
        assert_eq!(profile.pipeline("connect").unwrap().len(), 2);

        let db = profile.database().unwrap();
        assert_eq!(db.connection, "default");
        assert_eq!(db.connect.pipeline.as_deref(), Some("connect"));
        assert_eq!(db.connect.lane, "db.connect");
        assert_eq!(db.query, DatabaseRoute { pipeline: None, lane: "db.query".to_string() });
    }

    #[test]
    fn test_override_selects_profile() {
        let config = parse_config(CONFIG).unwrap();
        let profile = ProfileBuilder::new(&config)
            .profile_override(Some("small"))
            .build()
            .unwrap();

        assert_eq!(profile.name(), "small");
        assert_eq!(profile.pool("db-main").unwrap().global_max(), 1);
        assert!(profile.pipelines().is_empty());
        assert!(profile.database().is_none());
    }

    #[test]
    fn test_stub_profile_is_empty() {
        let config = ResilienceConfig::default();
        let profile = ProfileBuilder::new(&config).profile_override(None).build().unwrap();
        assert_eq!(profile.name(), "default");
        assert!(profile.pools().is_empty());
        assert!(profile.pipelines().is_empty());
    }

    #[test]
    fn test_database_unknown_pipeline_fails() {
        let raw = r#"
            [profiles.default.database]
            enabled = true
            query_pipeline = "missing"
        "#;
        let config = parse_config(raw).unwrap();
        let err = ProfileBuilder::new(&config).profile_override(None).build().unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownPipeline { role: "query", pipeline: "missing".to_string() }
        );
    }

    #[test]
    fn test_custom_retry_parser() {
        struct RejectAll;
        impl RetrySpecParser for RejectAll {
            fn validate(&self, _spec: &str) -> Result<(), String> {
                Err("rejected".to_string())
            }
        }

        let raw = r#"
            [[profiles.default.pipelines.p.stages]]
            type = "retry"
            retry = "rtry:attempts=3"
        "#;
        let config = parse_config(raw).unwrap();
        let err = ProfileBuilder::new(&config)
            .profile_override(None)
            .retry_parser(RejectAll)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidRetrySpec { reason, .. } if reason == "rejected"));
    }
}
