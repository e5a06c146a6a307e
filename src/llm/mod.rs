//! 生成层模块：可叠加的缓存、路由、重试包装层。
//!
//! # Generation Layers
//!
//! Every layer implements [`Llm`] and holds the next layer as `Arc<dyn Llm>`, so
//! any stacking order can be built by hand. [`LlmStack`] builds the usual one:
//!
//! ```text
//! CachingLlm -> RoutingLlm -> RetryingLlm -> BackendLlm -> ModelBackend
//! ```
//!
//! | Layer | Behavior |
//! |-------|----------|
//! | [`CachingLlm`] | Answers repeated questions from the cache |
//! | [`RoutingLlm`] | Picks the fast or powerful model per request |
//! | [`RetryingLlm`] | Re-issues failed calls with backoff |
//! | [`BackendLlm`] | Calls the [`ModelBackend`](crate::backend::ModelBackend) |

mod layers;
mod stack;

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::ModelBackend;
use crate::context::CallContext;
use crate::types::response::{LlmRequest, LlmResponse};
use crate::Result;

pub use layers::{CachingLlm, RetryingLlm, RoutingLlm};
pub use stack::LlmStack;

/// One generation call: one request in, exactly one response out.
#[async_trait]
pub trait Llm: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, ctx: &CallContext, request: LlmRequest) -> Result<LlmResponse>;
}

/// Bottom layer: forwards to a [`ModelBackend`].
pub struct BackendLlm {
    backend: Arc<dyn ModelBackend>,
    default_model: String,
}

impl BackendLlm {
    pub fn new(backend: Arc<dyn ModelBackend>, default_model: impl Into<String>) -> Self {
        Self {
            backend,
            default_model: default_model.into(),
        }
    }
}

#[async_trait]
impl Llm for BackendLlm {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn generate(&self, _ctx: &CallContext, request: LlmRequest) -> Result<LlmResponse> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        self.backend
            .generate(model, &request.contents, &request.config)
            .await
    }
}
