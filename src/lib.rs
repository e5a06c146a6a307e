//! # ai-lib-layers
//!
//! 可组合的模型调用包装层：响应缓存、工具结果缓存、动态模型路由与带退避的重试。
//!
//! Composable wrappers around calls to a hosted large language model. Each layer adds
//! one cross-cutting behavior and forwards everything else untouched.
//!
//! ## Overview
//!
//! ```text
//! Agent -> CachingLlm -> RoutingLlm -> RetryingLlm -> BackendLlm -> ModelBackend
//! ```
//!
//! - **Caching**: repeated questions and repeated tool calls are answered from a store
//!   keyed by a deterministic fingerprint.
//! - **Routing**: short conversations go to a fast model, long ones to a powerful model.
//! - **Retry**: transient upstream failures are retried a bounded number of times.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ai_lib_layers::{CallContext, GeminiBackend, LayersConfig, Llm, LlmRequest, LlmStack, Turn};
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_layers::Result<()> {
//!     ai_lib_layers::telemetry::init_tracing("info");
//!
//!     let config = LayersConfig::from_env()?;
//!     let backend = Arc::new(GeminiBackend::new(&config.backend)?);
//!     let llm = LlmStack::from_config(backend, &config)?.build();
//!
//!     let request = LlmRequest::new(vec![Turn::user("What is the exact speed of light in a vacuum?")]);
//!     let response = llm.generate(&CallContext::new(), request).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`llm`] | The [`Llm`] trait, the layers and [`LlmStack`] |
//! | [`cache`] | Key derivation, stores and the get-or-compute protocol |
//! | [`routing`] | Length-based model selection |
//! | [`resilience`] | Retry policy and attempt bookkeeping |
//! | [`backend`] | Model backend trait and the Gemini REST client |
//! | [`tools`] | Tool trait, registry with cached invocation, mock tools |
//! | [`session`] | Session state accessor, in-memory sessions, post-session analysis |
//! | [`agent`] | Thin agent tying an instruction, a layer stack and tools together |
//! | [`config`] | YAML and environment configuration |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`types`] | Turns, requests, responses and tool types |

pub mod agent;
pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod llm;
pub mod resilience;
pub mod routing;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod types;

pub use agent::{Agent, AgentBuilder};
pub use backend::{BackendConfig, GeminiBackend, ModelBackend};
pub use cache::{CacheConfig, CacheManager, CacheScope, CacheSource, KeyErrorPolicy};
pub use config::LayersConfig;
pub use context::CallContext;
pub use llm::{BackendLlm, CachingLlm, Llm, LlmStack, RetryingLlm, RoutingLlm};
pub use resilience::retry::{Backoff, RetryPolicy};
pub use routing::{ModelRouter, RoutingConfig, TextScope};
pub use types::{
    message::{Author, Part, Turn},
    response::{GenerationConfig, LlmRequest, LlmResponse},
    tool::{ToolCall, ToolOutcome},
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
