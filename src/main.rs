//! Resilience profile preflight.
//!
//! Loads a configuration file, builds the active profile and reports it, so
//! configuration mistakes surface before a host serves traffic.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use resilience_profile::config::load_config;
use resilience_profile::observability::logging;
use resilience_profile::pipeline::StageSpec;
use resilience_profile::profile::ProfileBuilder;

#[derive(Parser)]
#[command(name = "resilience-profile")]
#[command(about = "Validate and summarize a resilience profile", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "resilience.toml")]
    config: PathBuf,

    /// Profile to build; overrides the profile environment variable
    #[arg(short, long)]
    profile: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::DEFAULT_DIRECTIVE) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = ProfileBuilder::new(&config);
    if let Some(name) = cli.profile.as_deref() {
        builder = builder.profile_override(Some(name));
    }

    let profile = match builder.build() {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build resilience profile");
            return ExitCode::FAILURE;
        }
    };

    for (id, policy) in profile.pools() {
        tracing::info!(
            pool = %id,
            global_max = policy.global_max(),
            mode = %policy.mode(),
            lanes = ?policy.lane_limits(),
            "Pool policy"
        );
    }

    for (name, pipeline) in profile.pipelines() {
        let stages: Vec<String> = pipeline
            .iter()
            .map(|stage| match stage {
                StageSpec::Bulkhead { pool_id } => format!("bulkhead({})", pool_id),
                other => other.kind().to_string(),
            })
            .collect();
        tracing::info!(pipeline = %name, stages = ?stages, "Pipeline");
    }

    if let Some(db) = profile.database() {
        tracing::info!(
            connection = %db.connection,
            connect_lane = %db.connect.lane,
            query_lane = %db.query.lane,
            "Database binding"
        );
    }

    ExitCode::SUCCESS
}
