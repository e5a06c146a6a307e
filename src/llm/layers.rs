use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::Llm;
use crate::cache::{CacheManager, CacheOutcome};
use crate::context::CallContext;
use crate::resilience::retry::RetryPolicy;
use crate::routing::{ModelRouter, RoutingConfig};
use crate::types::response::{LlmRequest, LlmResponse};
use crate::Result;

/// Message-level response cache.
///
/// Keyed on the latest user text only; see [`crate::cache`] for the consequences.
pub struct CachingLlm {
    inner: Arc<dyn Llm>,
    cache: Arc<CacheManager>,
}

impl CachingLlm {
    pub fn new(inner: Arc<dyn Llm>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Generate and report whether the response was served from the cache.
    pub async fn generate_cached(
        &self,
        ctx: &CallContext,
        request: LlmRequest,
    ) -> Result<CacheOutcome<LlmResponse>> {
        let key = self.cache.keys().message_key(&request.contents);
        let outcome = self
            .cache
            .get_or_compute(ctx, &key, || self.inner.generate(ctx, request))
            .await?;
        info!(
            invocation_id = ctx.invocation_id.as_str(),
            source = ?outcome.source,
            "response cache"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl Llm for CachingLlm {
    fn name(&self) -> &str {
        "caching"
    }

    async fn generate(&self, ctx: &CallContext, request: LlmRequest) -> Result<LlmResponse> {
        Ok(self.generate_cached(ctx, request).await?.into_value())
    }
}

/// Rewrites the request's model from the conversation length.
pub struct RoutingLlm {
    inner: Arc<dyn Llm>,
    router: ModelRouter,
}

impl RoutingLlm {
    pub fn new(inner: Arc<dyn Llm>, config: RoutingConfig) -> Self {
        Self {
            inner,
            router: ModelRouter::new(config),
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }
}

#[async_trait]
impl Llm for RoutingLlm {
    fn name(&self) -> &str {
        "routing"
    }

    async fn generate(&self, ctx: &CallContext, mut request: LlmRequest) -> Result<LlmResponse> {
        let decision = self.router.route(&request.contents);
        info!(
            invocation_id = ctx.invocation_id.as_str(),
            model = decision.model.as_str(),
            tier = ?decision.tier,
            text_len = decision.text_len,
            "routed request"
        );
        request.model = Some(decision.model);
        self.inner.generate(ctx, request).await
    }
}

/// Retries the inner layer under a [`RetryPolicy`], honoring the context's cancellation.
pub struct RetryingLlm {
    inner: Arc<dyn Llm>,
    policy: RetryPolicy,
}

impl RetryingLlm {
    pub fn new(inner: Arc<dyn Llm>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Llm for RetryingLlm {
    fn name(&self) -> &str {
        "retrying"
    }

    async fn generate(&self, ctx: &CallContext, request: LlmRequest) -> Result<LlmResponse> {
        let inner = &self.inner;
        self.policy
            .execute(&ctx.cancel, move |_| inner.generate(ctx, request.clone()))
            .await
    }
}
