//! Tool result caching through the registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ai_lib_layers::cache::{CacheConfig, CacheManager, CacheScope, CacheSource};
use ai_lib_layers::session::{InMemorySession, SessionState};
use ai_lib_layers::tools::{builtin, FunctionTool, ToolRegistry};
use ai_lib_layers::types::tool::ToolDefinition;
use ai_lib_layers::{CallContext, ToolCall, ToolOutcome};
use serde_json::json;

fn counting_stock_tool(counter: Arc<AtomicUsize>) -> FunctionTool {
    let definition = ToolDefinition::new("get_stock_price").with_parameters(json!({
        "type": "object",
        "properties": { "symbol": { "type": "string" } },
        "required": ["symbol"]
    }));
    FunctionTool::from_fn(definition, move |args| {
        counter.fetch_add(1, Ordering::SeqCst);
        let symbol = args.get("symbol").and_then(|v| v.as_str()).unwrap_or_default();
        ToolOutcome::success(json!({ "stock_price": builtin::stock_price(symbol) }))
    })
}

fn registry(counter: Arc<AtomicUsize>, cache: CacheManager) -> ToolRegistry {
    ToolRegistry::new()
        .with_cache(Arc::new(cache))
        .with_tool(Arc::new(counting_stock_tool(counter)))
        .unwrap()
}

#[tokio::test]
async fn test_repeated_tool_call_executes_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tools = registry(counter.clone(), CacheManager::in_memory());
    let ctx = CallContext::new();
    let call = ToolCall::from_json("get_stock_price", json!({"symbol": "GOOGL"}));

    let first = tools.invoke_cached(&ctx, &call).await.unwrap();
    let second = tools.invoke_cached(&ctx, &call).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(first.source, CacheSource::Miss);
    assert_eq!(second.source, CacheSource::Hit);
    assert_eq!(first.value, second.value);
    assert_eq!(
        second.value.payload(),
        Some(&json!({"stock_price": "175.50 USD"}))
    );
}

#[tokio::test]
async fn test_argument_order_does_not_change_key() {
    let counter = Arc::new(AtomicUsize::new(0));
    let definition = ToolDefinition::new("lookup");
    let tool = {
        let counter = counter.clone();
        FunctionTool::from_fn(definition, move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            ToolOutcome::success(json!({ "n": args.len() }))
        })
    };
    let tools = ToolRegistry::new()
        .with_cache(Arc::new(CacheManager::in_memory()))
        .with_tool(Arc::new(tool))
        .unwrap();
    let ctx = CallContext::new();

    let a: serde_json::Value = serde_json::from_str(r#"{"city":"London","units":"metric"}"#).unwrap();
    let b: serde_json::Value = serde_json::from_str(r#"{"units":"metric","city":"London"}"#).unwrap();
    tools.invoke(&ctx, &ToolCall::from_json("lookup", a)).await.unwrap();
    let second = tools
        .invoke_cached(&ctx, &ToolCall::from_json("lookup", b))
        .await
        .unwrap();

    assert!(second.is_hit());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_different_arguments_execute_again() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tools = registry(counter.clone(), CacheManager::in_memory());
    let ctx = CallContext::new();

    tools
        .invoke(&ctx, &ToolCall::from_json("get_stock_price", json!({"symbol": "GOOGL"})))
        .await
        .unwrap();
    let msft = tools
        .invoke(&ctx, &ToolCall::from_json("get_stock_price", json!({"symbol": "MSFT"})))
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(msft.payload(), Some(&json!({"stock_price": "427.80 USD"})));
}

#[tokio::test]
async fn test_session_scope_writes_readable_key() {
    let counter = Arc::new(AtomicUsize::new(0));
    let cache = CacheManager::from_config(CacheConfig::new().with_scope(CacheScope::Session)).unwrap();
    let tools = registry(counter.clone(), cache);
    let session = Arc::new(InMemorySession::new("stocks", "user-1", "s1"));
    let ctx = CallContext::new().with_session(session.clone());
    let call = ToolCall::from_json("get_stock_price", json!({"symbol": "GOOGL"}));

    tools.invoke(&ctx, &call).await.unwrap();
    tools.invoke(&ctx, &call).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let stored = session
        .get(r#"cache:tool:get_stock_price:{"symbol":"GOOGL"}"#)
        .await
        .unwrap();
    assert!(stored.is_some());

    let other = Arc::new(InMemorySession::new("stocks", "user-1", "s2"));
    tools
        .invoke(&CallContext::new().with_session(other), &call)
        .await
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_arguments_are_reported_not_executed() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tools = registry(counter.clone(), CacheManager::in_memory());

    let outcome = tools
        .invoke(
            &CallContext::new(),
            &ToolCall::from_json("get_stock_price", json!({"ticker": "GOOGL"})),
        )
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(matches!(outcome, ToolOutcome::Error { ref code, .. } if code == "invalid_arguments"));
}

#[tokio::test]
async fn test_builtin_weather_tool() {
    let tools = ToolRegistry::new()
        .with_tool(Arc::new(builtin::weather_tool()))
        .unwrap();
    let outcome = tools
        .invoke(
            &CallContext::new(),
            &ToolCall::from_json("get_weather", json!({"city": "London"})),
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.payload(),
        Some(&json!({"weather_report": "cloudy with a temperature of 15°C."}))
    );
}
