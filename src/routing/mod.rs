//! 动态模型路由模块：按对话文本长度选择快速或强力模型。
//!
//! # Dynamic Model Routing
//!
//! This module is pure logic: it performs no network calls. Every request is routed
//! fresh from its own conversation text; no state is carried between calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RoutingConfig`] | Model names, length threshold and text scope |
//! | [`TextScope`] | Which part of the conversation is measured |
//! | [`ModelRouter`] | Produces a [`RouteDecision`] for a conversation |
//!
//! Length is counted in Unicode scalar values. Text strictly longer than the
//! threshold goes to the powerful model; text of exactly the threshold length
//! stays on the fast one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::message::{full_text, last_turn_text, latest_user_text, Turn};
use crate::{Error, ErrorContext, Result};

pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_POWERFUL_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_THRESHOLD: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// Every turn's text parts joined by a single space.
    #[default]
    FullConversation,
    /// Only the most recent user turn.
    LatestUserTurn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// When false the stack leaves the requested model untouched.
    pub enabled: bool,
    pub fast_model: String,
    pub powerful_model: String,
    pub threshold: usize,
    pub scope: TextScope,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            powerful_model: DEFAULT_POWERFUL_MODEL.to_string(),
            threshold: DEFAULT_THRESHOLD,
            scope: TextScope::FullConversation,
        }
    }
}

impl RoutingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_models(mut self, fast: impl Into<String>, powerful: impl Into<String>) -> Self {
        self.fast_model = fast.into();
        self.powerful_model = powerful.into();
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scope(mut self, scope: TextScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("routing.fast_model", &self.fast_model),
            ("routing.powerful_model", &self.powerful_model),
        ] {
            if value.trim().is_empty() {
                return Err(Error::configuration_with_context(
                    "model name must not be empty",
                    ErrorContext::new().with_field_path(field),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTier {
    Fast,
    Powerful,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub tier: RouteTier,
    pub model: String,
    /// Measured length in characters.
    pub text_len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    config: RoutingConfig,
}

impl ModelRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Text measured for routing. Falls back to the last turn's text when the
    /// configured scope yields nothing.
    pub fn extract_text(&self, turns: &[Turn]) -> String {
        let text = match self.config.scope {
            TextScope::FullConversation => full_text(turns),
            TextScope::LatestUserTurn => latest_user_text(turns).unwrap_or_default(),
        };
        if text.is_empty() {
            last_turn_text(turns)
        } else {
            text
        }
    }

    pub fn route(&self, turns: &[Turn]) -> RouteDecision {
        let text_len = self.extract_text(turns).chars().count();
        let (tier, model) = if text_len > self.config.threshold {
            (RouteTier::Powerful, &self.config.powerful_model)
        } else {
            (RouteTier::Fast, &self.config.fast_model)
        };
        debug!(
            text_len,
            threshold = self.config.threshold,
            model = model.as_str(),
            "routing decision"
        );
        RouteDecision {
            tier,
            model: model.clone(),
            text_len,
        }
    }
}
