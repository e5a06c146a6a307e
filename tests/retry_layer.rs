//! Retry behavior through the layer stack

mod common;

use std::sync::Arc;
use std::time::Duration;

use ai_lib_layers::{
    BackendLlm, CacheManager, CallContext, Error, Llm, LlmRequest, LlmStack, RetryPolicy,
    RetryingLlm, Turn,
};
use common::{DownBackend, ScriptedBackend};
use tokio_util::sync::CancellationToken;

fn ask(text: &str) -> LlmRequest {
    LlmRequest::new(vec![Turn::user(text)])
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_two_transient_failures() {
    let backend = ScriptedBackend::failing_first(2);
    let llm = LlmStack::new(backend.clone())
        .with_retry(RetryPolicy::default())
        .build();

    let start = tokio::time::Instant::now();
    let response = llm.generate(&CallContext::new(), ask("hi")).await.unwrap();

    assert_eq!(backend.calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert!(response.text().ends_with("answer to: hi"));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_returns_last_error() {
    let backend = DownBackend::new();
    let llm = RetryingLlm::new(
        Arc::new(BackendLlm::new(backend.clone(), "gemini-2.5-flash")),
        RetryPolicy::new(3, Duration::from_secs(5)),
    );

    let err = llm.generate(&CallContext::new(), ask("hi")).await.unwrap_err();
    assert_eq!(backend.calls(), 3);
    assert!(matches!(err, Error::Upstream { .. }));
    assert!(err.to_string().contains("scripted failure #3"));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_does_not_retry() {
    let backend = DownBackend::new();
    let llm = LlmStack::new(backend.clone())
        .with_retry(RetryPolicy::new(1, Duration::from_secs(5)))
        .build();

    assert!(llm.generate(&CallContext::new(), ask("hi")).await.is_err());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_makes_no_calls() {
    let backend = ScriptedBackend::new();
    let llm = LlmStack::new(backend.clone())
        .with_retry(RetryPolicy::default())
        .build();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = CallContext::new().with_cancellation(token);

    let err = llm.generate(&ctx, ask("hi")).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_retrying() {
    let backend = DownBackend::new();
    let llm = LlmStack::new(backend.clone())
        .with_retry(RetryPolicy::new(3, Duration::from_secs(5)))
        .build();
    let token = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    let err = llm.generate(&ctx, ask("hi")).await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_in_flight_attempt() {
    let backend = ScriptedBackend::slow(Duration::from_secs(60));
    let llm = LlmStack::new(backend.clone())
        .with_retry(RetryPolicy::default())
        .build();
    let token = CancellationToken::new();
    let ctx = CallContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });
    let start = tokio::time::Instant::now();
    let err = llm.generate(&ctx, ask("hi")).await.unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retried_answer_is_cached_once() {
    let backend = ScriptedBackend::failing_first(1);
    let llm = LlmStack::new(backend.clone())
        .with_cache(Arc::new(CacheManager::in_memory()))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
        .build();
    let ctx = CallContext::new();

    let first = llm.generate(&ctx, ask("hi")).await.unwrap();
    let second = llm.generate(&ctx, ask("hi")).await.unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(first, second);
}
