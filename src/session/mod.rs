//! 会话状态模块：按会话划分的键值状态访问接口及内存实现。
//!
//! # Session State Module
//!
//! Session-scoped caching and post-session analysis read and write through a
//! per-conversation key/value mapping owned by an external session store. This
//! module defines that accessor as the [`SessionState`] trait and ships an
//! in-memory implementation for tests and single-process deployments.
//!
//! ## Reserved keys
//!
//! | Key | Writer |
//! |-----|--------|
//! | `cache:tool:<name>:<canonical-args>` | tool-level session cache |
//! | `cache:llm:<digest>` | message-level session cache |
//! | `post_analysis_v1` | [`analysis::SessionAnalyzer`] |

pub mod analysis;
mod memory;

pub use memory::{InMemorySession, InMemorySessionService, SessionEvent};

use async_trait::async_trait;

use crate::Result;

/// Accessor for one conversation's persisted state.
#[async_trait]
pub trait SessionState: Send + Sync {
    fn session_id(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<bool>;
    async fn keys(&self) -> Result<Vec<String>>;

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
