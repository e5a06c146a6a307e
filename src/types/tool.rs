//! Tool calling types.

use serde::{Deserialize, Serialize};

/// Argument mapping passed to a tool.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the argument object.
    pub parameters: Option<serde_json::Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, schema: serde_json::Value) -> Self {
        self.parameters = Some(schema);
        self
    }
}

/// Tool call (invocation requested by the model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: ToolArgs,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build a call from a JSON object literal; non-object values yield empty arguments.
    pub fn from_json(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => ToolArgs::new(),
        };
        Self::new(name, args)
    }
}

/// Result of a tool execution: a payload, or a structured error the model can read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: serde_json::Value },
    Error { code: String, message: String },
}

impl ToolOutcome {
    pub fn success(payload: serde_json::Value) -> Self {
        ToolOutcome::Success { payload }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ToolOutcome::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            ToolOutcome::Success { payload } => Some(payload),
            ToolOutcome::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_is_tagged() {
        let ok = ToolOutcome::success(json!({"stock_price": "175.50 USD"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "payload": {"stock_price": "175.50 USD"}})
        );
        let err = ToolOutcome::error("invalid_arguments", "missing symbol");
        assert_eq!(serde_json::to_value(&err).unwrap()["status"], "error");
        assert!(err.payload().is_none());
    }

    #[test]
    fn test_call_from_non_object_is_empty() {
        let call = ToolCall::from_json("get_weather", json!("london"));
        assert!(call.args.is_empty());
    }
}
