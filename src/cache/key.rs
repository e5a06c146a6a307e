//! Cache key generation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::message::{latest_user_text_or_last, Turn};
use crate::{Error, ErrorContext, Result};

/// Marker for absent or empty tool arguments.
pub const EMPTY_ARGS: &str = "{}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyNamespace {
    /// Message-level key over the latest user text.
    Llm,
    /// Invocation-level key over a tool name and its arguments.
    Tool,
}

impl KeyNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyNamespace::Llm => "llm",
            KeyNamespace::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: KeyNamespace,
    pub hash: String,
}

impl CacheKey {
    pub fn new(namespace: KeyNamespace, hash: impl Into<String>) -> Self {
        Self {
            namespace,
            hash: hash.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Derives [`CacheKey`]s for message-level and tool-level caching.
///
/// Message keys only look at the latest user turn: two conversations that end with the
/// same user text share a key even when their earlier history differs.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }

    /// Mix a salt into message digests, e.g. to invalidate keys after a prompt change.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn message_key(&self, turns: &[Turn]) -> CacheKey {
        let text = latest_user_text_or_last(turns);
        let mut hasher = Sha256::new();
        if let Some(ref s) = self.salt {
            hasher.update(s.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(text.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey::new(KeyNamespace::Llm, hash)
    }

    /// `name + ":" + canonical-args`. Arguments must serialize to a JSON object or null.
    pub fn tool_key<A: Serialize + ?Sized>(&self, name: &str, args: &A) -> Result<CacheKey> {
        let value = serde_json::to_value(args).map_err(|e| {
            Error::key_derivation(
                format!("arguments for '{}' are not serializable: {}", name, e),
                ErrorContext::new().with_source("cache_key"),
            )
        })?;
        let canonical = match value {
            serde_json::Value::Null => EMPTY_ARGS.to_string(),
            serde_json::Value::Object(ref map) if map.is_empty() => EMPTY_ARGS.to_string(),
            serde_json::Value::Object(_) => canonical_json(&value),
            other => {
                return Err(Error::key_derivation(
                    format!("arguments for '{}' must be an object", name),
                    ErrorContext::new()
                        .with_source("cache_key")
                        .with_details(format!("got: {}", json_kind(&other))),
                ))
            }
        };
        Ok(CacheKey::new(KeyNamespace::Tool, format!("{}:{}", name, canonical)))
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Strings always serialize.
                out.push_str(&serde_json::Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
