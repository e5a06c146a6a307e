//! 缓存模块：基于请求指纹的响应与工具结果缓存。
//!
//! # Caching Module
//!
//! Memoizes model generations and tool invocations behind a deterministic
//! fingerprint. A repeated request is answered from the store without reaching the
//! model backend or executing the tool again.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheKeyGenerator`] | Message-level digests and tool-level canonical keys |
//! | [`CacheManager`] | Lookup / compute / store protocol with single-flight and statistics |
//! | [`CacheConfig`] | Scope, bounding, single-flight and key-error policy |
//! | [`CacheBackend`] | Trait for pluggable stores |
//! | [`MemoryCache`] | Process-wide store, unbounded or LRU-bounded |
//! | [`SessionCache`] | Store living inside one conversation's session state |
//! | [`NullCache`] | No-op store |
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_layers::cache::CacheManager;
//! use ai_lib_layers::types::message::Turn;
//!
//! let cache = CacheManager::in_memory();
//! let key = cache.keys().message_key(&[Turn::user("What is pi?")]);
//! assert_eq!(key.hash.len(), 64);
//! ```
//!
//! ## Key derivation
//!
//! Message keys hash only the most recent user turn. Conversations with different
//! histories that end in the same question share an entry; callers that need
//! history-sensitive answers should salt the generator or disable the cache.

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache, SessionCache, SESSION_CACHE_PREFIX};
pub use key::{canonical_json, CacheKey, CacheKeyGenerator, KeyNamespace, EMPTY_ARGS};
pub use manager::{
    CacheConfig, CacheManager, CacheOutcome, CacheScope, CacheSource, CacheStats, KeyErrorPolicy,
};
