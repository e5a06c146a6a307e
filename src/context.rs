//! Per-call ambient data handed to every layer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::session::SessionState;

/// Context for one logical call through the layers.
///
/// Cloning is cheap; clones share the session handle and the cancellation token.
#[derive(Clone)]
pub struct CallContext {
    pub invocation_id: String,
    pub session: Option<Arc<dyn SessionState>>,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            invocation_id: Uuid::new_v4().to_string(),
            session: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_invocation_id(mut self, id: impl Into<String>) -> Self {
        self.invocation_id = id.into();
        self
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("invocation_id", &self.invocation_id)
            .field("session", &self.session.as_ref().map(|s| s.session_id().to_string()))
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
