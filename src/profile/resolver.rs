//! Active profile selection.
//!
//! Resolution order:
//! 1. the override (environment) if non-empty and configured
//! 2. the default profile name if configured
//! 3. an empty stub profile: no pools, no pipelines

use std::collections::BTreeMap;
use std::env;

use crate::config::schema::{ProfileConfig, ResilienceConfig};

/// The profile chosen for this process.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    /// Name reported as active. For the stub this is the default name.
    pub name: String,
    pub config: ProfileConfig,
    /// True when neither the override nor the default was configured.
    pub is_stub: bool,
}

/// Select the active profile.
///
/// Pure function over its inputs; see [`resolve_from_env`] for the variant
/// that reads the override from the environment.
pub fn resolve_profile(
    profiles: &BTreeMap<String, ProfileConfig>,
    override_name: Option<&str>,
    default_name: &str,
) -> ResolvedProfile {
    let requested = override_name
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let mut active = requested.unwrap_or(default_name);
    if !profiles.contains_key(active) {
        if requested.is_some() {
            tracing::warn!(
                requested = %active,
                default = %default_name,
                "Requested profile not configured, falling back to default"
            );
        }
        active = default_name;
    }

    match profiles.get(active) {
        Some(config) => ResolvedProfile {
            name: active.to_string(),
            config: config.clone(),
            is_stub: false,
        },
        None => {
            tracing::warn!(
                default = %default_name,
                "Default profile not configured, running without pools or pipelines"
            );
            ResolvedProfile {
                name: default_name.to_string(),
                config: ProfileConfig::default(),
                is_stub: true,
            }
        }
    }
}

/// Read the override variable named by the config once and resolve.
pub fn resolve_from_env(config: &ResilienceConfig) -> ResolvedProfile {
    let override_value = env::var(&config.profile_env_var).ok();
    resolve_profile(
        &config.profiles,
        override_value.as_deref(),
        &config.default_profile,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles(names: &[&str]) -> BTreeMap<String, ProfileConfig> {
        names
            .iter()
            .map(|n| (n.to_string(), ProfileConfig::default()))
            .collect()
    }

    #[test]
    fn test_override_wins_when_present() {
        let resolved = resolve_profile(&profiles(&["default", "prod"]), Some("prod"), "default");
        assert_eq!(resolved.name, "prod");
        assert!(!resolved.is_stub);
    }

    #[test]
    fn test_empty_override_uses_default() {
        let resolved = resolve_profile(&profiles(&["default", "prod"]), Some("  "), "default");
        assert_eq!(resolved.name, "default");
    }

    #[test]
    fn test_unknown_override_falls_back_to_default() {
        let resolved = resolve_profile(&profiles(&["default"]), Some("staging"), "default");
        assert_eq!(resolved.name, "default");
        assert!(!resolved.is_stub);
    }

    #[test]
    fn test_missing_default_yields_stub() {
        let resolved = resolve_profile(&profiles(&["prod"]), None, "default");
        assert!(resolved.is_stub);
        assert_eq!(resolved.name, "default");
        assert!(resolved.config.pools.is_empty());
        assert!(resolved.config.pipelines.is_empty());
    }

    #[test]
    fn test_env_override_is_read() {
        let mut config = ResilienceConfig {
            profile_env_var: "RESILIENCE_PROFILE_RESOLVER_TEST".to_string(),
            ..ResilienceConfig::default()
        };
        config.profiles = profiles(&["default", "canary"]);

        env::set_var("RESILIENCE_PROFILE_RESOLVER_TEST", "canary");
        let resolved = resolve_from_env(&config);
        env::remove_var("RESILIENCE_PROFILE_RESOLVER_TEST");

        assert_eq!(resolved.name, "canary");
    }
}
