//! Retry stage resolution.
//!
//! # Responsibilities
//! - Turn a stage's raw `retry` value into a [`RetrySpec`]
//! - Validate opaque spec strings at build time
//!
//! # Design Decisions
//! - A broken spec string is fatal; it never degrades to "no retry"
//! - Blank strings, tables and absent values use the built-in settings

use std::time::Duration;

use crate::config::schema::{RetrySettings, RetryValue};
use crate::pipeline::stage::RetrySpec;
use crate::profile::error::{BuildError, BuildResult};

/// Validates opaque retry spec strings on behalf of the retry executor.
pub trait RetrySpecParser: Send + Sync {
    /// Return a human readable reason when `spec` cannot be parsed.
    fn validate(&self, spec: &str) -> Result<(), String>;
}

/// Parser for the `rtry:key=value;key=value` spec grammar.
///
/// Known keys are type checked (`attempts` positive integer; `delay`,
/// `max_delay` and `timeout` durations such as `50ms` or `2s`; `jitter`
/// boolean). Other keys are accepted for the executor to interpret.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtrySpecParser;

impl RtrySpecParser {
    const PREFIX: &'static str = "rtry:";
}

impl RetrySpecParser for RtrySpecParser {
    fn validate(&self, spec: &str) -> Result<(), String> {
        let spec = spec.trim();
        let body = spec.strip_prefix(Self::PREFIX).unwrap_or(spec).trim();
        if body.is_empty() {
            return Err("empty retry spec".to_string());
        }

        for segment in body.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got '{}'", segment))?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                return Err(format!("missing key in '{}'", segment));
            }
            if value.is_empty() {
                return Err(format!("missing value for '{}'", key));
            }

            match key {
                "attempts" => match value.parse::<u32>() {
                    Ok(n) if n >= 1 => {}
                    _ => return Err(format!("attempts must be a positive integer, got '{}'", value)),
                },
                "delay" | "max_delay" | "timeout" => {
                    parse_duration(value)
                        .ok_or_else(|| format!("{} must be a duration like 50ms or 2s, got '{}'", key, value))?;
                }
                "jitter" => {
                    value
                        .parse::<bool>()
                        .map_err(|_| format!("jitter must be true or false, got '{}'", value))?;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Parse `50ms`, `2s` or a bare millisecond count.
fn parse_duration(value: &str) -> Option<Duration> {
    let (digits, unit_ms) = if let Some(ms) = value.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(s) = value.strip_suffix('s') {
        (s, 1000)
    } else {
        (value, 1)
    };
    let amount: u64 = digits.trim().parse().ok()?;
    amount.checked_mul(unit_ms).map(Duration::from_millis)
}

/// Resolve a stage's raw retry value.
pub fn resolve_retry(
    pipeline: &str,
    value: Option<&RetryValue>,
    parser: &dyn RetrySpecParser,
) -> BuildResult<RetrySpec> {
    match value {
        Some(RetryValue::Spec(spec)) if !spec.trim().is_empty() => {
            parser
                .validate(spec)
                .map_err(|reason| BuildError::InvalidRetrySpec {
                    pipeline: pipeline.to_string(),
                    spec: spec.clone(),
                    reason,
                })?;
            Ok(RetrySpec::External { spec: spec.clone() })
        }
        Some(RetryValue::Settings(settings)) => structured(pipeline, settings),
        _ => structured(pipeline, &RetrySettings::default()),
    }
}

fn structured(pipeline: &str, settings: &RetrySettings) -> BuildResult<RetrySpec> {
    let invalid = |reason: String| BuildError::InvalidRetrySettings {
        pipeline: pipeline.to_string(),
        reason,
    };

    let max_attempts = settings.max_attempts.unwrap_or(3);
    let base_delay_ms = settings.base_delay_ms.unwrap_or(50);
    let max_delay_ms = settings.max_delay_ms.unwrap_or(1000);

    let max_attempts = u32::try_from(max_attempts)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| invalid(format!("max_attempts must be >= 1, got {}", max_attempts)))?;
    let base_delay_ms = u64::try_from(base_delay_ms)
        .map_err(|_| invalid(format!("base_delay_ms must be >= 0, got {}", base_delay_ms)))?;
    let max_delay_ms = u64::try_from(max_delay_ms)
        .ok()
        .filter(|v| *v >= base_delay_ms)
        .ok_or_else(|| {
            invalid(format!(
                "max_delay_ms ({}) must be >= base_delay_ms ({})",
                max_delay_ms, base_delay_ms
            ))
        })?;

    Ok(RetrySpec::Structured {
        max_attempts,
        base_delay_ms,
        max_delay_ms,
        jitter: settings.jitter.unwrap_or(true),
    })
}
