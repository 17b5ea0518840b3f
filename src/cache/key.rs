//! Scope identity and deterministic cache key derivation.

use serde::{Deserialize, Serialize};

/// Separator between key segments.
pub const KEY_DELIMITER: char = '|';

/// Leading segment of every scope's key registry.
pub const REGISTRY_SENTINEL: &str = "cachekeys";

/// Opaque cache key as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Ordered identifiers of one execution context (run, scenario, requestor, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeIdentity {
    segments: Vec<String>,
}

impl ScopeIdentity {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for ScopeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        push_scope(&mut out, self);
        f.write_str(&out)
    }
}

/// Pure key derivation: identical inputs always produce identical keys.
///
/// Layout is `<collection>|<discriminator>|<scope...>` for entries and
/// `cachekeys|<scope...>` for the registry. `\` and `|` inside segments are
/// backslash-escaped, and a collection literally named `cachekeys` is written
/// as `\cachekeys`, so no two distinct inputs share a key.
pub struct ScopeKeyBuilder;

impl ScopeKeyBuilder {
    pub fn entity_key(scope: &ScopeIdentity, collection: &str, discriminator: &str) -> CacheKey {
        let mut out = String::new();
        if collection == REGISTRY_SENTINEL {
            out.push('\\');
            out.push_str(collection);
        } else {
            push_escaped(&mut out, collection);
        }
        out.push(KEY_DELIMITER);
        push_escaped(&mut out, discriminator);
        out.push(KEY_DELIMITER);
        push_scope(&mut out, scope);
        CacheKey(out)
    }

    pub fn registry_key(scope: &ScopeIdentity) -> CacheKey {
        let mut out = String::from(REGISTRY_SENTINEL);
        out.push(KEY_DELIMITER);
        push_scope(&mut out, scope);
        CacheKey(out)
    }
}

fn push_scope(out: &mut String, scope: &ScopeIdentity) {
    for (i, segment) in scope.segments.iter().enumerate() {
        if i > 0 {
            out.push(KEY_DELIMITER);
        }
        push_escaped(out, segment);
    }
}

fn push_escaped(out: &mut String, segment: &str) {
    for c in segment.chars() {
        if c == '\\' || c == KEY_DELIMITER {
            out.push('\\');
        }
        out.push(c);
    }
}
