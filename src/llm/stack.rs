use std::sync::Arc;

use super::{BackendLlm, CachingLlm, Llm, RetryingLlm, RoutingLlm};
use crate::backend::ModelBackend;
use crate::cache::CacheManager;
use crate::config::LayersConfig;
use crate::resilience::retry::RetryPolicy;
use crate::routing::RoutingConfig;
use crate::Result;

/// Builder for the standard layer order.
///
/// Layers that were not configured are left out of the chain.
pub struct LlmStack {
    backend: Arc<dyn ModelBackend>,
    default_model: String,
    cache: Option<Arc<CacheManager>>,
    routing: Option<RoutingConfig>,
    retry: Option<RetryPolicy>,
}

impl LlmStack {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            default_model: crate::routing::DEFAULT_FAST_MODEL.to_string(),
            cache: None,
            routing: None,
            retry: None,
        }
    }

    /// All layers as described by `config`.
    pub fn from_config(backend: Arc<dyn ModelBackend>, config: &LayersConfig) -> Result<Self> {
        config.validate()?;
        let mut stack = Self::new(backend).with_default_model(config.backend.default_model.clone());
        if config.cache.enabled {
            stack = stack.with_cache(Arc::new(CacheManager::from_config(config.cache.clone())?));
        }
        if config.routing.enabled {
            stack = stack.with_routing(config.routing.clone());
        }
        Ok(stack.with_retry(RetryPolicy::from_config(&config.retry)))
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_routing(mut self, config: RoutingConfig) -> Self {
        self.routing = Some(config);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> Arc<dyn Llm> {
        let mut llm: Arc<dyn Llm> = Arc::new(BackendLlm::new(self.backend, self.default_model));
        if let Some(policy) = self.retry {
            llm = Arc::new(RetryingLlm::new(llm, policy));
        }
        if let Some(routing) = self.routing {
            llm = Arc::new(RoutingLlm::new(llm, routing));
        }
        if let Some(cache) = self.cache {
            llm = Arc::new(CachingLlm::new(llm, cache));
        }
        llm
    }
}
