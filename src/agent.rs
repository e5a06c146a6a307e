//! 代理模块：把生成层与工具注册表组合成单个对话代理。
//!
//! An [`Agent`] is deliberately thin: it owns an instruction, an [`Llm`] stack and a
//! [`ToolRegistry`]. Deciding when to call tools and driving multi-step loops is
//! left to the caller.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheManager;
use crate::context::CallContext;
use crate::llm::Llm;
use crate::tools::{Tool, ToolRegistry};
use crate::types::message::Turn;
use crate::types::response::{GenerationConfig, LlmRequest, LlmResponse};
use crate::types::tool::{ToolCall, ToolDefinition, ToolOutcome};
use crate::{Error, ErrorContext, Result};

pub struct Agent {
    name: String,
    description: String,
    instruction: String,
    llm: Arc<dyn Llm>,
    tools: ToolRegistry,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Generate a reply to `text` and append both turns to `history`.
    ///
    /// `history` is left untouched when generation fails.
    pub async fn run_turn(
        &self,
        ctx: &CallContext,
        history: &mut Vec<Turn>,
        text: impl Into<String>,
    ) -> Result<LlmResponse> {
        let user = Turn::user(text);
        let mut config = GenerationConfig::default();
        if !self.instruction.is_empty() {
            config = config.with_system_instruction(self.instruction.clone());
        }
        let mut contents = history.clone();
        contents.push(user.clone());
        let request = LlmRequest::new(contents).with_config(config);
        let response = self.llm.generate(ctx, request).await?;
        info!(
            agent = self.name.as_str(),
            invocation_id = ctx.invocation_id.as_str(),
            model = response.model.as_str(),
            "turn complete"
        );
        history.push(user);
        history.push(response.content.clone());
        Ok(response)
    }

    pub async fn call_tool(&self, ctx: &CallContext, call: &ToolCall) -> Result<ToolOutcome> {
        self.tools.invoke(ctx, call).await
    }
}

pub struct AgentBuilder {
    name: String,
    description: String,
    instruction: String,
    llm: Option<Arc<dyn Llm>>,
    tools: Vec<Arc<dyn Tool>>,
    tool_cache: Option<Arc<CacheManager>>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            llm: None,
            tools: Vec::new(),
            tool_cache: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Memoize successful tool outcomes in `cache`.
    pub fn with_tool_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.tool_cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let llm = self.llm.ok_or_else(|| {
            Error::configuration_with_context(
                format!("agent '{}' has no model layer", self.name),
                ErrorContext::new().with_source("agent_builder"),
            )
        })?;
        let mut tools = match self.tool_cache {
            Some(cache) => ToolRegistry::new().with_cache(cache),
            None => ToolRegistry::new(),
        };
        for tool in self.tools {
            tools.register(tool)?;
        }
        Ok(Agent {
            name: self.name,
            description: self.description,
            instruction: self.instruction,
            llm,
            tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl Llm for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, _ctx: &CallContext, request: LlmRequest) -> Result<LlmResponse> {
            let reply = format!("echo: {}", request.contents.last().map(Turn::text).unwrap_or_default());
            self.seen.lock().unwrap().push(request);
            Ok(LlmResponse::new(Turn::model(reply), "test-model"))
        }
    }

    #[tokio::test]
    async fn test_run_turn_appends_both_turns() {
        let echo = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let agent = Agent::builder("assistant")
            .with_instruction("Answer briefly.")
            .with_llm(echo.clone())
            .build()
            .unwrap();

        let mut history = Vec::new();
        let resp = agent
            .run_turn(&CallContext::new(), &mut history, "hi")
            .await
            .unwrap();
        assert_eq!(resp.text(), "echo: hi");
        assert_eq!(history.len(), 2);

        let seen = echo.seen.lock().unwrap();
        assert_eq!(
            seen[0].config.system_instruction.as_deref(),
            Some("Answer briefly.")
        );
    }

    #[tokio::test]
    async fn test_call_tool_through_registry() {
        let agent = Agent::builder("StockAgent")
            .with_llm(Arc::new(Echo {
                seen: Mutex::new(Vec::new()),
            }))
            .with_tool(Arc::new(builtin::stock_tool()))
            .build()
            .unwrap();
        let outcome = agent
            .call_tool(
                &CallContext::new(),
                &ToolCall::from_json("get_stock_price", json!({"symbol": "MSFT"})),
            )
            .await
            .unwrap();
        assert_eq!(outcome.payload(), Some(&json!({"stock_price": "427.80 USD"})));
        assert_eq!(agent.tool_definitions().len(), 1);
    }

    struct Unavailable;

    #[async_trait]
    impl Llm for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn generate(&self, _ctx: &CallContext, _request: LlmRequest) -> Result<LlmResponse> {
            Err(Error::upstream("model unavailable"))
        }
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_history_untouched() {
        let agent = Agent::builder("assistant")
            .with_llm(Arc::new(Unavailable))
            .build()
            .unwrap();
        let mut history = vec![Turn::user("earlier"), Turn::model("reply")];

        let result = agent
            .run_turn(&CallContext::new(), &mut history, "hi")
            .await;
        assert!(result.is_err());
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text(), "reply");
    }

    #[test]
    fn test_build_requires_llm() {
        assert!(Agent::builder("lonely").build().is_err());
    }
}
