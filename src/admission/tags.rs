//! Declarative admission tags.
//!
//! # Responsibilities
//! - Parse `@Bulkhead(pool="...", lane="...", timeout=0.25)` markers from
//!   handler metadata text
//! - Convert marker fields into typed [`ResourceTag`]s
//! - Cache resolved tags per handler identity
//!
//! # Parsing Rules
//! - Handler-level markers precede type-level markers; source order within each
//! - Commas inside single or double quotes do not split pairs
//! - Surrounding quotes are stripped; keys are trimmed and lowercased
//! - Unknown keys are preserved; an empty marker yields an empty field map
//!
//! # Design Decisions
//! - Text is parsed once per handler identity, never per invocation
//! - Tags can also be declared directly as typed values

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

const MARKER: &str = "@Bulkhead(";

/// Raw key/value fields of one marker occurrence.
pub type TagFields = BTreeMap<String, String>;

/// Parse every marker in `text`, in source order.
pub fn parse_markers(text: &str) -> Vec<TagFields> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(MARKER) {
        let after = &rest[start + MARKER.len()..];
        // Marker bodies end at the first closing parenthesis.
        let Some(end) = after.find(')') else {
            break;
        };
        out.push(parse_body(&after[..end]));
        rest = &after[end + 1..];
    }

    out
}

/// Parse handler-level text followed by type-level text.
pub fn parse_handler_markers(handler_doc: &str, type_doc: &str) -> Vec<TagFields> {
    let mut fields = parse_markers(handler_doc);
    fields.extend(parse_markers(type_doc));
    fields
}

fn parse_body(body: &str) -> TagFields {
    let mut fields = TagFields::new();
    for pair in split_pairs(body.trim()) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_lowercase(), trim_quotes(value).to_string());
    }
    fields
}

fn split_pairs(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in body.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ',' => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    parts.push(&body[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn trim_quotes(value: &str) -> &str {
    let value = value.trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// One admission requirement of a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTag {
    pub pool: String,
    /// Lane to acquire on; unset means the operation's route.
    pub lane: Option<String>,
    /// Seconds to wait for capacity; unset waits indefinitely. Negative or
    /// non-finite values fail fast.
    pub timeout: Option<f64>,
    /// Keys this crate does not interpret.
    pub extra: BTreeMap<String, String>,
}

impl ResourceTag {
    pub fn new(pool: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            lane: None,
            timeout: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_lane(mut self, lane: impl Into<String>) -> Self {
        self.lane = Some(lane.into());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Build a tag from parsed marker fields.
    ///
    /// Returns `None` when the marker names no pool.
    pub fn from_fields(fields: &TagFields) -> Option<Self> {
        let pool = fields.get("pool").map(|p| p.trim()).filter(|p| !p.is_empty())?;

        let lane = fields
            .get("lane")
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        let timeout = fields
            .get("timeout")
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|raw| match raw.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs >= 0.0 => secs,
                _ => {
                    tracing::warn!(pool = %pool, timeout = %raw, "Invalid bulkhead timeout, failing fast");
                    0.0
                }
            });

        let extra = fields
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "pool" | "lane" | "timeout"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            pool: pool.to_string(),
            lane,
            timeout,
            extra,
        })
    }

    /// Wait limit for acquisition. Out-of-range values map to zero.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

/// Convert parsed markers into tags, dropping markers without a pool.
pub fn tags_from_fields(fields: &[TagFields]) -> Vec<ResourceTag> {
    fields
        .iter()
        .filter_map(|f| {
            let tag = ResourceTag::from_fields(f);
            if tag.is_none() {
                tracing::debug!(fields = ?f, "Skipping bulkhead marker without pool");
            }
            tag
        })
        .collect()
}

/// Resolved tags per handler identity.
#[derive(Debug, Default)]
pub struct TagRegistry {
    handlers: DashMap<String, Arc<[ResourceTag]>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare typed tags for a handler, replacing earlier ones.
    pub fn register(&self, handler: impl Into<String>, tags: Vec<ResourceTag>) {
        self.handlers.insert(handler.into(), tags.into());
    }

    /// Parse and cache the markers of a handler's metadata.
    ///
    /// Text is parsed only the first time a handler is seen.
    pub fn register_docs(&self, handler: &str, handler_doc: &str, type_doc: &str) -> Arc<[ResourceTag]> {
        self.resolve_or_insert_with(handler, || {
            tags_from_fields(&parse_handler_markers(handler_doc, type_doc))
        })
    }

    /// Cached tags of `handler`, computing them with `parse` on first use.
    pub fn resolve_or_insert_with<F>(&self, handler: &str, parse: F) -> Arc<[ResourceTag]>
    where
        F: FnOnce() -> Vec<ResourceTag>,
    {
        if let Some(tags) = self.handlers.get(handler) {
            return tags.value().clone();
        }
        self.handlers
            .entry(handler.to_string())
            .or_insert_with(|| parse().into())
            .value()
            .clone()
    }

    /// Tags of `handler`; empty when none were declared.
    pub fn resolve(&self, handler: &str) -> Arc<[ResourceTag]> {
        self.handlers
            .get(handler)
            .map(|tags| tags.value().clone())
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
