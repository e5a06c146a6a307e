//! Cache backend implementations.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use lru::LruCache;

use super::key::CacheKey;
use crate::session::SessionState;
use crate::{Error, ErrorContext, Result};

/// Prefix under which cache entries live inside session state.
pub const SESSION_CACHE_PREFIX: &str = "cache:";

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<serde_json::Value>>;
    async fn store(&self, key: &CacheKey, value: serde_json::Value) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    async fn clear(&self) -> Result<()>;
    /// Identifies the mapping this backend reads; equal scopes share in-flight guards.
    fn scope(&self) -> String;
    fn name(&self) -> &'static str;
}

enum Entries {
    Unbounded(HashMap<String, serde_json::Value>),
    Bounded(LruCache<String, serde_json::Value>),
}

/// Process-scoped in-memory store.
///
/// Unbounded by default: entries live as long as the cache. [`MemoryCache::bounded`]
/// opts into least-recently-used eviction.
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::Unbounded(HashMap::new())),
        }
    }

    pub fn bounded(max_entries: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(Entries::Bounded(LruCache::new(max_entries))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries.lock().map_err(|_| {
            Error::cache_with_context(
                "memory cache lock poisoned",
                ErrorContext::new().with_source("memory_cache"),
            )
        })
    }

    fn slot(key: &CacheKey) -> String {
        format!("{}:{}", key.namespace.as_str(), key.hash)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        let slot = Self::slot(key);
        let mut entries = self.lock()?;
        Ok(match &mut *entries {
            Entries::Unbounded(map) => map.get(&slot).cloned(),
            Entries::Bounded(lru) => lru.get(&slot).cloned(),
        })
    }

    async fn store(&self, key: &CacheKey, value: serde_json::Value) -> Result<()> {
        let slot = Self::slot(key);
        let mut entries = self.lock()?;
        match &mut *entries {
            Entries::Unbounded(map) => {
                map.insert(slot, value);
            }
            Entries::Bounded(lru) => {
                lru.put(slot, value);
            }
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.lock()?;
        Ok(match &*entries {
            Entries::Unbounded(map) => map.len(),
            Entries::Bounded(lru) => lru.len(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        match &mut *entries {
            Entries::Unbounded(map) => map.clear(),
            Entries::Bounded(lru) => lru.clear(),
        }
        Ok(())
    }

    fn scope(&self) -> String {
        "process".to_string()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Session-scoped store writing through a conversation's own state accessor.
///
/// Entries are kept under `cache:<namespace>:<key>`, e.g.
/// `cache:tool:get_stock_price:{"symbol":"GOOGL"}`.
pub struct SessionCache {
    state: Arc<dyn SessionState>,
}

impl SessionCache {
    pub fn new(state: Arc<dyn SessionState>) -> Self {
        Self { state }
    }

    pub fn state_key(key: &CacheKey) -> String {
        format!(
            "{}{}:{}",
            SESSION_CACHE_PREFIX,
            key.namespace.as_str(),
            key.hash
        )
    }

    async fn cache_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(SESSION_CACHE_PREFIX))
            .collect())
    }
}

#[async_trait]
impl CacheBackend for SessionCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        self.state.get(&Self::state_key(key)).await
    }

    async fn store(&self, key: &CacheKey, value: serde_json::Value) -> Result<()> {
        self.state.set(&Self::state_key(key), value).await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.cache_keys().await?.len())
    }

    async fn clear(&self) -> Result<()> {
        for k in self.cache_keys().await? {
            self.state.remove(&k).await?;
        }
        Ok(())
    }

    fn scope(&self) -> String {
        format!("session:{}", self.state.session_id())
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn lookup(&self, _: &CacheKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }
    async fn store(&self, _: &CacheKey, _: serde_json::Value) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    fn scope(&self) -> String {
        "null".to_string()
    }
    fn name(&self) -> &'static str {
        "null"
    }
}
