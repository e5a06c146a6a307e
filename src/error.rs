use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "retry.max_attempts", "args.symbol")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "gemini_backend", "tool_registry")
    pub source: Option<String>,
    /// HTTP status returned by the upstream service, if any
    pub status_code: Option<u16>,
    /// 1-based attempt number the error was observed on
    pub attempt: Option<u32>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

/// Unified error type for the layer runtime.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream call failed: {message}{}", format_context(.context))]
    Upstream {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache key derivation failed: {message}{}", format_context(.context))]
    KeyDerivation {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache backend error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("Session state error: {message}{}", format_context(.context))]
    Session {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Operation cancelled{}", format_context(.context))]
    Cancelled { context: ErrorContext },

    #[error("Network transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if let Some(attempt) = ctx.attempt {
        parts.push(format!("attempt: {}", attempt));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Error::Upstream {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn upstream_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Upstream {
            message: msg.into(),
            context,
        }
    }

    pub fn key_derivation(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::KeyDerivation {
            message: msg.into(),
            context,
        }
    }

    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    pub fn session_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Session {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn cancelled(context: ErrorContext) -> Self {
        Error::Cancelled { context }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Upstream { context, .. }
            | Error::KeyDerivation { context, .. }
            | Error::Cache { context, .. }
            | Error::Session { context, .. }
            | Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Cancelled { context } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = Error::upstream_with_context(
            "quota exceeded",
            ErrorContext::new()
                .with_source("gemini_backend")
                .with_status_code(429),
        );
        assert_eq!(
            err.to_string(),
            "Upstream call failed: quota exceeded (source: gemini_backend, status: 429)"
        );
    }

    #[test]
    fn test_display_without_context() {
        let err = Error::upstream("boom");
        assert_eq!(err.to_string(), "Upstream call failed: boom");
        assert!(err.context().is_some());
    }

    #[test]
    fn test_cancelled_is_detected() {
        assert!(Error::cancelled(ErrorContext::new()).is_cancelled());
        assert!(!Error::upstream("x").is_cancelled());
    }
}
