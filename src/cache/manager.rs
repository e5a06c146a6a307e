//! Cache manager.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{CacheBackend, MemoryCache, SessionCache};
use super::key::{CacheKey, CacheKeyGenerator};
use crate::context::CallContext;
use crate::{Error, ErrorContext, Result};

/// Which mapping backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// One mapping for the whole process, shared by every conversation.
    #[default]
    Process,
    /// A namespaced region of the calling conversation's session state.
    Session,
}

/// What to do when a cache key cannot be derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyErrorPolicy {
    /// Skip the cache and run the underlying call.
    #[default]
    Bypass,
    /// Surface the derivation error to the caller.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub scope: CacheScope,
    /// `None` keeps the store unbounded.
    pub max_entries: Option<usize>,
    /// Collapse concurrent misses on one key into a single computation.
    pub single_flight: bool,
    pub on_key_error: KeyErrorPolicy,
    pub salt: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: CacheScope::Process,
            max_entries: None,
            single_flight: true,
            on_key_error: KeyErrorPolicy::Bypass,
            salt: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn with_scope(mut self, scope: CacheScope) -> Self {
        self.scope = scope;
        self
    }
    pub fn with_max_entries(mut self, n: usize) -> Self {
        self.max_entries = Some(n);
        self
    }
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
    pub fn with_key_error_policy(mut self, policy: KeyErrorPolicy) -> Self {
        self.on_key_error = policy;
        self
    }
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub bypasses: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    bypasses: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Where a returned value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Served from the store; the wrapped operation did not run.
    Hit,
    /// Computed by the wrapped operation.
    Miss,
    /// Computed with caching skipped (disabled, no session, or key failure).
    Bypass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub source: CacheSource,
}

impl<T> CacheOutcome<T> {
    pub fn new(value: T, source: CacheSource) -> Self {
        Self { value, source }
    }

    pub fn is_hit(&self) -> bool {
        self.source == CacheSource::Hit
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

type InflightMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

enum Read<T> {
    Found(T),
    Absent,
    Faulty,
}

/// Owns the cache store and runs the lookup / compute / store protocol.
///
/// Failures inside the cache (backend errors, undecodable entries) are logged and
/// counted but never fail the wrapped call.
pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    keys: CacheKeyGenerator,
    stats: AtomicStats,
    inflight: Mutex<InflightMap>,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        let keys = match config.salt {
            Some(ref s) => CacheKeyGenerator::new().with_salt(s.clone()),
            None => CacheKeyGenerator::new(),
        };
        Self {
            config,
            backend: Arc::from(backend),
            keys,
            stats: AtomicStats::default(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Build the process store the config describes.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        let backend: Box<dyn CacheBackend> = match config.max_entries {
            None => Box::new(MemoryCache::new()),
            Some(n) => {
                let n = NonZeroUsize::new(n).ok_or_else(|| {
                    Error::configuration_with_context(
                        "cache capacity must be greater than zero",
                        ErrorContext::new().with_field_path("cache.max_entries"),
                    )
                })?;
                Box::new(MemoryCache::bounded(n))
            }
        };
        Ok(Self::new(config, backend))
    }

    /// Unbounded process-scoped cache with default settings.
    pub fn in_memory() -> Self {
        Self::new(CacheConfig::default(), Box::new(MemoryCache::new()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn keys(&self) -> &CacheKeyGenerator {
        &self.keys
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Apply the key-error policy to a derivation result.
    ///
    /// `Ok(None)` means "run uncached".
    pub fn resolve_key(&self, derived: Result<CacheKey>) -> Result<Option<CacheKey>> {
        match derived {
            Ok(key) => Ok(Some(key)),
            Err(e) => match self.config.on_key_error {
                KeyErrorPolicy::Bypass => {
                    warn!(error = %e, "cache key derivation failed; bypassing cache");
                    AtomicStats::bump(&self.stats.bypasses);
                    Ok(None)
                }
                KeyErrorPolicy::Fail => Err(e),
            },
        }
    }

    fn backend_for(&self, ctx: &CallContext) -> Option<Arc<dyn CacheBackend>> {
        if !self.config.enabled {
            return None;
        }
        match self.config.scope {
            CacheScope::Process => Some(self.backend.clone()),
            CacheScope::Session => match ctx.session {
                Some(ref session) => Some(Arc::new(SessionCache::new(session.clone()))),
                None => {
                    warn!(
                        invocation_id = ctx.invocation_id.as_str(),
                        "session-scoped cache without a session; bypassing cache"
                    );
                    None
                }
            },
        }
    }

    pub async fn lookup(&self, ctx: &CallContext, key: &CacheKey) -> Result<Option<serde_json::Value>> {
        match self.backend_for(ctx) {
            Some(backend) => backend.lookup(key).await,
            None => Ok(None),
        }
    }

    pub async fn store(&self, ctx: &CallContext, key: &CacheKey, value: serde_json::Value) -> Result<()> {
        match self.backend_for(ctx) {
            Some(backend) => {
                backend.store(key, value).await?;
                AtomicStats::bump(&self.stats.sets);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn get_or_compute<T, F, Fut>(
        &self,
        ctx: &CallContext,
        key: &CacheKey,
        compute: F,
    ) -> Result<CacheOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get_or_compute_with(ctx, key, compute, |_| true).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), storing only values `is_cacheable` accepts.
    pub async fn get_or_compute_with<T, F, Fut, P>(
        &self,
        ctx: &CallContext,
        key: &CacheKey,
        compute: F,
        is_cacheable: P,
    ) -> Result<CacheOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: FnOnce(&T) -> bool,
    {
        let Some(backend) = self.backend_for(ctx) else {
            AtomicStats::bump(&self.stats.bypasses);
            return Ok(CacheOutcome::new(compute().await?, CacheSource::Bypass));
        };

        let first = self.read(backend.as_ref(), key, true).await;
        let faulty = match first {
            Read::Found(value) => return Ok(self.hit(backend.as_ref(), key, value)),
            Read::Absent => false,
            Read::Faulty => true,
        };

        let slot = format!("{}|{}:{}", backend.scope(), key.namespace.as_str(), key.hash);
        let flight = if self.config.single_flight {
            self.inflight_lock(&slot)
        } else {
            None
        };
        let guard = match flight {
            Some(ref lock) => Some(lock.clone().lock_owned().await),
            None => None,
        };
        if guard.is_some() {
            // Another caller may have filled the entry while we waited.
            // A fault already counted above is not counted again.
            if let Read::Found(value) = self.read(backend.as_ref(), key, !faulty).await {
                drop(guard);
                self.release(&slot, flight);
                return Ok(self.hit(backend.as_ref(), key, value));
            }
        }

        AtomicStats::bump(&self.stats.misses);
        debug!(key = %key, backend = backend.name(), "cache miss");
        let result = compute().await;
        if let Ok(ref value) = result {
            if is_cacheable(value) {
                self.write(backend.as_ref(), key, value).await;
            }
        }
        drop(guard);
        self.release(&slot, flight);
        Ok(CacheOutcome::new(result?, CacheSource::Miss))
    }

    fn hit<T>(&self, backend: &dyn CacheBackend, key: &CacheKey, value: T) -> CacheOutcome<T> {
        AtomicStats::bump(&self.stats.hits);
        debug!(key = %key, backend = backend.name(), "cache hit");
        CacheOutcome::new(value, CacheSource::Hit)
    }

    /// Look `key` up; faults are counted and logged only when `report` is set.
    async fn read<T: DeserializeOwned>(
        &self,
        backend: &dyn CacheBackend,
        key: &CacheKey,
        report: bool,
    ) -> Read<T> {
        match backend.lookup(key).await {
            Ok(Some(raw)) => match serde_json::from_value(raw) {
                Ok(value) => Read::Found(value),
                Err(e) => {
                    if report {
                        AtomicStats::bump(&self.stats.errors);
                        warn!(key = %key, error = %e, "undecodable cache entry; recomputing");
                    }
                    Read::Faulty
                }
            },
            Ok(None) => Read::Absent,
            Err(e) => {
                if report {
                    AtomicStats::bump(&self.stats.errors);
                    warn!(key = %key, backend = backend.name(), error = %e, "cache lookup failed");
                }
                Read::Faulty
            }
        }
    }

    async fn write<T: Serialize>(&self, backend: &dyn CacheBackend, key: &CacheKey, value: &T) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, error = %e, "cache entry not serializable; not stored");
                return;
            }
        };
        match backend.store(key, raw).await {
            Ok(()) => {
                AtomicStats::bump(&self.stats.sets);
                debug!(key = %key, backend = backend.name(), "cache entry stored");
            }
            Err(e) => {
                AtomicStats::bump(&self.stats.errors);
                warn!(key = %key, backend = backend.name(), error = %e, "cache store failed");
            }
        }
    }

    fn inflight_lock(&self, slot: &str) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let mut inflight = self.inflight.lock().ok()?;
        Some(
            inflight
                .entry(slot.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone(),
        )
    }

    /// Drop the slot once no other caller holds or waits on its lock.
    ///
    /// Call after the guard is dropped. Clones are only taken under the map lock, so
    /// the count seen here includes every queued waiter.
    fn release(&self, slot: &str, lock: Option<Arc<tokio::sync::Mutex<()>>>) {
        let Some(lock) = lock else { return };
        if let Ok(mut inflight) = self.inflight.lock() {
            let last = inflight.get(slot).is_some_and(|l| Arc::ptr_eq(l, &lock))
                && Arc::strong_count(&lock) == 2;
            if last {
                inflight.remove(slot);
            }
        }
    }
}
