//! 工具模块：工具接口、注册表与带缓存的工具调用。
//!
//! # Tools Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Tool`] | Async tool interface |
//! | [`FunctionTool`] | Adapter turning a closure into a [`Tool`] |
//! | [`ToolRegistry`] | Name lookup, argument validation and cached invocation |
//! | [`builtin`] | Mock `get_weather` and `get_stock_price` tools |
//!
//! Tool results are memoized per `(name, canonical arguments)`. Only successful
//! outcomes are stored; a tool that reported an error runs again next time.

pub mod builtin;
mod registry;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::types::tool::{ToolArgs, ToolDefinition, ToolOutcome};
use crate::Result;

pub use registry::ToolRegistry;

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. `Ok(ToolOutcome::Error { .. })` is a result the model can read;
    /// `Err` is a failure of the call itself.
    async fn execute(&self, ctx: &CallContext, args: &ToolArgs) -> Result<ToolOutcome>;

    fn name(&self) -> String {
        self.definition().name
    }
}

type BoxedHandler =
    Arc<dyn Fn(ToolArgs) -> Pin<Box<dyn Future<Output = Result<ToolOutcome>> + Send>> + Send + Sync>;

/// A tool backed by a closure.
#[derive(Clone)]
pub struct FunctionTool {
    definition: ToolDefinition,
    handler: BoxedHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutcome>> + Send + 'static,
    {
        Self {
            definition,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }

    /// Wrap a synchronous function.
    pub fn from_fn<F>(definition: ToolDefinition, f: F) -> Self
    where
        F: Fn(&ToolArgs) -> ToolOutcome + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(definition, move |args| {
            let f = f.clone();
            async move { Ok(f(&args)) }
        })
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.name)
            .finish()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, _ctx: &CallContext, args: &ToolArgs) -> Result<ToolOutcome> {
        (self.handler)(args.clone()).await
    }

    fn name(&self) -> String {
        self.definition.name.clone()
    }
}
