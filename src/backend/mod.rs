//! 模型后端模块：执行实际的模型生成调用。
//!
//! # Model Backend Module
//!
//! The backend is the only component that talks to the hosted model. It owns no
//! cache or retry state; those concerns live in the layers stacked on top of it.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ModelBackend`] | Trait: one generation call for a named model |
//! | [`BackendConfig`] | Endpoint selection and credentials |
//! | [`gemini::GeminiBackend`] | `generateContent` REST client (AI Studio or Vertex AI) |
//!
//! ## Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GOOGLE_GENAI_USE_VERTEXAI` | `use_vertex` (`true`/`1`) |
//! | `GOOGLE_CLOUD_PROJECT` | `project` |
//! | `GOOGLE_CLOUD_LOCATION` | `location` |
//! | `GOOGLE_API_KEY` | `api_key` |
//! | `GOOGLE_ACCESS_TOKEN` | `access_token` (Vertex bearer token; optional only with `base_url`) |
//! | `AI_LAYERS_BACKEND_URL` | `base_url` |
//! | `AI_LAYERS_DEFAULT_MODEL` | `default_model` |
//! | `AI_LAYERS_HTTP_TIMEOUT_SECS` | `timeout_secs` |

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::message::Turn;
use crate::types::response::{GenerationConfig, LlmResponse};
use crate::{Error, ErrorContext, Result};

pub use gemini::GeminiBackend;

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        config: &GenerationConfig,
    ) -> Result<LlmResponse>;
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Model used when no router picked one.
    pub default_model: String,
    pub use_vertex: bool,
    pub project: Option<String>,
    pub location: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    /// Overrides the public endpoint, e.g. for a proxy or a test server.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_model: crate::routing::DEFAULT_FAST_MODEL.to_string(),
            use_vertex: false,
            project: None,
            location: "us-central1".to_string(),
            api_key: None,
            access_token: None,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("default_model", &self.default_model)
            .field("use_vertex", &self.use_vertex)
            .field("project", &self.project)
            .field("location", &self.location)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_vertex(
        mut self,
        project: impl Into<String>,
        location: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        self.use_vertex = true;
        self.project = Some(project.into());
        self.location = location.into();
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Apply environment-style overrides; `lookup` returns the value of a variable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GOOGLE_GENAI_USE_VERTEXAI") {
            self.use_vertex = parse_bool("GOOGLE_GENAI_USE_VERTEXAI", &v)?;
        }
        if let Some(v) = lookup("GOOGLE_CLOUD_PROJECT") {
            self.project = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_CLOUD_LOCATION") {
            self.location = v;
        }
        if let Some(v) = lookup("GOOGLE_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("GOOGLE_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = lookup("AI_LAYERS_BACKEND_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = lookup("AI_LAYERS_DEFAULT_MODEL") {
            self.default_model = v;
        }
        if let Some(v) = lookup("AI_LAYERS_HTTP_TIMEOUT_SECS") {
            self.timeout_secs = v.parse().map_err(|_| {
                Error::configuration_with_context(
                    "expected a whole number of seconds",
                    ErrorContext::new()
                        .with_field_path("AI_LAYERS_HTTP_TIMEOUT_SECS")
                        .with_details(format!("got: {}", v)),
                )
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "default model must not be empty",
                ErrorContext::new().with_field_path("backend.default_model"),
            ));
        }
        if self.use_vertex {
            if self.project.as_deref().map_or(true, str::is_empty) {
                return Err(Error::configuration_with_context(
                    "Vertex AI requires a project",
                    ErrorContext::new().with_field_path("backend.project"),
                ));
            }
            if self.location.is_empty() {
                return Err(Error::configuration_with_context(
                    "Vertex AI requires a location",
                    ErrorContext::new().with_field_path("backend.location"),
                ));
            }
            // A custom base URL may be an authenticating proxy.
            if self.base_url.is_none() && self.access_token.as_deref().map_or(true, str::is_empty) {
                return Err(Error::configuration_with_context(
                    "Vertex AI requires an access token",
                    ErrorContext::new().with_field_path("backend.access_token"),
                ));
            }
        } else if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(Error::configuration_with_context(
                "an API key is required unless Vertex AI is enabled",
                ErrorContext::new().with_field_path("backend.api_key"),
            ));
        }
        Ok(())
    }
}

pub(crate) fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::configuration_with_context(
            "expected a boolean",
            ErrorContext::new()
                .with_field_path(var)
                .with_details(format!("got: {}", value)),
        )),
    }
}
