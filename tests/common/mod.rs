//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_lib_layers::backend::ModelBackend;
use ai_lib_layers::types::message::{latest_user_text_or_last, Turn};
use ai_lib_layers::{Error, GenerationConfig, LlmResponse, Result};
use async_trait::async_trait;

/// Backend that answers deterministically and records every call.
pub struct ScriptedBackend {
    calls: AtomicUsize,
    fail_first: usize,
    delay: Option<Duration>,
    models: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Self::build(0, None)
    }

    /// Fails the first `k` calls with an upstream error.
    pub fn failing_first(k: usize) -> Arc<Self> {
        Self::build(k, None)
    }

    /// Sleeps for `delay` before answering.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(0, Some(delay))
    }

    fn build(fail_first: usize, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_first,
            delay,
            models: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        model: &str,
        turns: &[Turn],
        _config: &GenerationConfig,
    ) -> Result<LlmResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.models.lock().unwrap().push(model.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if n <= self.fail_first {
            return Err(Error::upstream(format!("scripted failure #{}", n)));
        }
        let answer = format!("[{}] answer to: {}", model, latest_user_text_or_last(turns));
        Ok(LlmResponse::new(Turn::model(answer), model))
    }
}

/// Backend that fails every call.
pub struct DownBackend {
    calls: AtomicUsize,
}

impl DownBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for DownBackend {
    fn name(&self) -> &str {
        "down"
    }

    async fn generate(&self, _: &str, _: &[Turn], _: &GenerationConfig) -> Result<LlmResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Err(Error::upstream(format!("scripted failure #{}", n)))
    }
}
