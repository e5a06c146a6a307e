//! Tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use tracing::{debug, warn};

use super::Tool;
use crate::cache::{CacheManager, CacheOutcome, CacheSource};
use crate::context::CallContext;
use crate::types::tool::{ToolCall, ToolDefinition, ToolOutcome};
use crate::{Error, ErrorContext, Result};

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    schema: Option<JSONSchema>,
}

/// Registered tools, keyed by name.
///
/// With a [`CacheManager`] attached, successful outcomes are memoized under
/// `name:canonical-args`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    cache: Option<Arc<CacheManager>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register a tool, compiling its parameter schema.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let definition = tool.definition();
        if self.tools.contains_key(&definition.name) {
            return Err(Error::configuration_with_context(
                format!("tool '{}' is already registered", definition.name),
                ErrorContext::new().with_source("tool_registry"),
            ));
        }
        let schema = match definition.parameters {
            Some(ref params) => Some(
                JSONSchema::options()
                    .with_draft(Draft::Draft7)
                    .compile(params)
                    .map_err(|e| {
                        Error::configuration_with_context(
                            format!("invalid parameter schema: {}", e),
                            ErrorContext::new()
                                .with_field_path(format!("tools.{}.parameters", definition.name))
                                .with_source("tool_registry"),
                        )
                    })?,
            ),
            None => None,
        };
        self.tools
            .insert(definition.name.clone(), RegisteredTool { tool, schema });
        Ok(())
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.tool.clone())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.tool.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn invoke(&self, ctx: &CallContext, call: &ToolCall) -> Result<ToolOutcome> {
        Ok(self.invoke_cached(ctx, call).await?.into_value())
    }

    /// Invoke and report whether the outcome came from the cache.
    pub async fn invoke_cached(
        &self,
        ctx: &CallContext,
        call: &ToolCall,
    ) -> Result<CacheOutcome<ToolOutcome>> {
        let Some(entry) = self.tools.get(&call.name) else {
            warn!(tool = call.name.as_str(), "unknown tool");
            return Ok(CacheOutcome::new(
                ToolOutcome::error("unknown_tool", format!("no tool named '{}'", call.name)),
                CacheSource::Bypass,
            ));
        };

        if let Some(ref schema) = entry.schema {
            let instance = serde_json::Value::Object(call.args.clone());
            let problems: Vec<String> = match schema.validate(&instance) {
                Ok(()) => Vec::new(),
                Err(errors) => errors.map(|e| e.to_string()).collect(),
            };
            if !problems.is_empty() {
                let message = problems.join("; ");
                debug!(tool = call.name.as_str(), error = message.as_str(), "tool arguments rejected");
                return Ok(CacheOutcome::new(
                    ToolOutcome::error("invalid_arguments", message),
                    CacheSource::Bypass,
                ));
            }
        }

        let tool = entry.tool.clone();
        let Some(ref cache) = self.cache else {
            return Ok(CacheOutcome::new(tool.execute(ctx, &call.args).await?, CacheSource::Bypass));
        };
        let Some(key) = cache.resolve_key(cache.keys().tool_key(&call.name, &call.args))? else {
            return Ok(CacheOutcome::new(tool.execute(ctx, &call.args).await?, CacheSource::Bypass));
        };

        cache
            .get_or_compute_with(
                ctx,
                &key,
                || tool.execute(ctx, &call.args),
                ToolOutcome::is_success,
            )
            .await
    }
}
