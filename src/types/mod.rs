//! 类型系统模块：对话轮次、生成请求/响应与工具调用的核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that flows through the layers.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Turn`] | One conversation message: author role plus content parts |
//! | [`Author`] | `user`, `model`, `system`, or a named specialist agent |
//! | [`LlmRequest`] | Turns plus generation config, optionally pinned to a model |
//! | [`LlmResponse`] | The single response of one generation call |
//! | [`ToolCall`] | Tool invocation with a JSON argument object |
//! | [`ToolOutcome`] | Tagged tool result: success payload or structured error |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_layers::types::{LlmRequest, Turn};
//!
//! let request = LlmRequest::new(vec![
//!     Turn::user("What is the exact speed of light in a vacuum?"),
//! ]);
//! assert_eq!(request.contents.len(), 1);
//! ```

pub mod message;
pub mod response;
pub mod tool;

pub use message::{Author, Part, Turn};
pub use response::{GenerationConfig, LlmRequest, LlmResponse, UsageInfo};
pub use tool::{ToolArgs, ToolCall, ToolDefinition, ToolOutcome};
