//! Layer configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! cache:
//!   scope: session
//!   max_entries: 10000
//! retry:
//!   max_attempts: 3
//!   delay_ms: 5000
//!   backoff: exponential
//! routing:
//!   threshold: 100
//!   scope: full_conversation
//! backend:
//!   default_model: gemini-2.5-flash
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AI_LAYERS_CACHE_ENABLED` | `cache.enabled` |
//! | `AI_LAYERS_CACHE_SCOPE` | `cache.scope` (`process` / `session`) |
//! | `AI_LAYERS_CACHE_MAX_ENTRIES` | `cache.max_entries` |
//! | `AI_LAYERS_CACHE_SINGLE_FLIGHT` | `cache.single_flight` |
//! | `AI_LAYERS_CACHE_KEY_ERROR` | `cache.on_key_error` (`bypass` / `fail`) |
//! | `AI_LAYERS_CACHE_SALT` | `cache.salt` |
//! | `AI_LAYERS_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `AI_LAYERS_RETRY_DELAY_MS` | `retry.delay_ms` |
//! | `AI_LAYERS_RETRY_BACKOFF` | `retry.backoff` (`fixed` / `exponential`) |
//! | `AI_LAYERS_RETRY_MAX_DELAY_MS` | `retry.max_delay_ms` |
//! | `AI_LAYERS_ROUTING_ENABLED` | `routing.enabled` |
//! | `AI_LAYERS_FAST_MODEL` | `routing.fast_model` |
//! | `AI_LAYERS_POWERFUL_MODEL` | `routing.powerful_model` |
//! | `AI_LAYERS_ROUTING_THRESHOLD` | `routing.threshold` |
//! | `AI_LAYERS_ROUTING_SCOPE` | `routing.scope` |
//!
//! Backend variables are listed in [`crate::backend`].

use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::{parse_bool, BackendConfig};
use crate::cache::CacheConfig;
use crate::resilience::retry::RetryConfig;
use crate::routing::RoutingConfig;
use crate::{Error, ErrorContext, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayersConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub routing: RoutingConfig,
    pub backend: BackendConfig,
}

impl LayersConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(config)
    }

    /// Defaults plus the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AI_LAYERS_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("AI_LAYERS_CACHE_ENABLED", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_CACHE_SCOPE") {
            self.cache.scope = parse_enum("AI_LAYERS_CACHE_SCOPE", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_CACHE_MAX_ENTRIES") {
            self.cache.max_entries = Some(parse_num("AI_LAYERS_CACHE_MAX_ENTRIES", &v)?);
        }
        if let Some(v) = lookup("AI_LAYERS_CACHE_SINGLE_FLIGHT") {
            self.cache.single_flight = parse_bool("AI_LAYERS_CACHE_SINGLE_FLIGHT", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_CACHE_KEY_ERROR") {
            self.cache.on_key_error = parse_enum("AI_LAYERS_CACHE_KEY_ERROR", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_CACHE_SALT") {
            self.cache.salt = Some(v);
        }

        if let Some(v) = lookup("AI_LAYERS_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_num("AI_LAYERS_RETRY_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_RETRY_DELAY_MS") {
            self.retry.delay_ms = parse_num("AI_LAYERS_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_RETRY_BACKOFF") {
            self.retry.backoff = parse_enum("AI_LAYERS_RETRY_BACKOFF", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_RETRY_MAX_DELAY_MS") {
            self.retry.max_delay_ms = parse_num("AI_LAYERS_RETRY_MAX_DELAY_MS", &v)?;
        }

        if let Some(v) = lookup("AI_LAYERS_ROUTING_ENABLED") {
            self.routing.enabled = parse_bool("AI_LAYERS_ROUTING_ENABLED", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_FAST_MODEL") {
            self.routing.fast_model = v;
        }
        if let Some(v) = lookup("AI_LAYERS_POWERFUL_MODEL") {
            self.routing.powerful_model = v;
        }
        if let Some(v) = lookup("AI_LAYERS_ROUTING_THRESHOLD") {
            self.routing.threshold = parse_num("AI_LAYERS_ROUTING_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("AI_LAYERS_ROUTING_SCOPE") {
            self.routing.scope = parse_enum("AI_LAYERS_ROUTING_SCOPE", &v)?;
        }

        self.backend.apply_overrides(lookup)
    }

    /// Structural checks. Backend credentials are checked when a backend is built.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == Some(0) {
            return Err(Error::configuration_with_context(
                "cache capacity must be greater than zero",
                ErrorContext::new().with_field_path("cache.max_entries"),
            ));
        }
        if self.backend.default_model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "default model must not be empty",
                ErrorContext::new().with_field_path("backend.default_model"),
            ));
        }
        self.routing.validate()
    }
}

fn parse_num<T: FromStr>(var: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration_with_context(
            "expected a non-negative integer",
            ErrorContext::new()
                .with_field_path(var)
                .with_details(format!("got: {}", value)),
        )
    })
}

fn parse_enum<T: DeserializeOwned>(var: &str, value: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase())).map_err(|e| {
        Error::configuration_with_context(
            "unrecognized value",
            ErrorContext::new()
                .with_field_path(var)
                .with_details(e.to_string()),
        )
    })
}
