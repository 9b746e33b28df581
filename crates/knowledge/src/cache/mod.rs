//! Response cache keyed by normalised question text.
//!
//! Keys are `<namespace>:<sha256 of the trimmed, lowercased question>`.
//! Entries expire after the configured TTL. Any store failure is logged and
//! treated as a miss, so the assistant keeps answering without a cache.

pub mod store;

pub use store::{CacheStore, FileStore, MemoryStore};

use crate::config::{CacheBackend, CacheConfig};
use crate::deadline::with_deadline;
use crate::rag::types::ResponseEnvelope;
use mira_core::AppResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of cache activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub backend: String,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,

    /// Hit percentage with two decimals, e.g. "66.67%"; "0%" before any lookup
    pub hit_rate: String,
}

/// TTL cache of answer envelopes.
pub struct ResponseCache {
    store: Option<Arc<dyn CacheStore>>,
    namespace: String,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            namespace: namespace.into(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: None,
            namespace: CacheConfig::default().namespace,
            ttl: Duration::ZERO,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build the cache described by `config`.
    ///
    /// A file backend that cannot be opened disables the cache instead of
    /// failing startup.
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            tracing::info!("Response cache disabled by configuration");
            return Self::disabled();
        }

        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
            CacheBackend::File => {
                let dir = config
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(".mira").join("cache"));
                match FileStore::open(&dir) {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        tracing::warn!("Response cache unavailable, continuing without it: {}", e);
                        return Self::disabled();
                    }
                }
            }
        };

        Self::new(
            store,
            config.namespace.clone(),
            Duration::from_secs(config.ttl_hours * 3600),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Cache key for a question.
    pub fn key_for(&self, question: &str) -> String {
        format!("{}:{}", self.namespace, question_digest(question))
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Look up a cached envelope. Failures read as a miss.
    pub async fn get(&self, question: &str) -> Option<ResponseEnvelope> {
        let store = self.store.as_ref()?;
        let key = self.key_for(question);

        let found = match with_deadline("cache get", STORE_TIMEOUT, store.get(&key)).await {
            Ok(Some(raw)) => match serde_json::from_str::<ResponseEnvelope>(&raw) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache lookup failed, treating as miss: {}", e);
                None
            }
        };

        match found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit for {}", key);
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        found
    }

    /// Store an envelope. Returns whether it was written.
    pub async fn put(&self, question: &str, envelope: &ResponseEnvelope) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let mut stored = envelope.clone();
        stored.from_cache = false;

        let raw = match serde_json::to_string(&stored) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize response for cache: {}", e);
                return false;
            }
        };

        let key = self.key_for(question);
        match with_deadline("cache set", STORE_TIMEOUT, store.set(&key, raw, self.ttl)).await {
            Ok(()) => {
                tracing::debug!("Cached response under {}", key);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to cache response: {}", e);
                false
            }
        }
    }

    /// Remove the entry for `question`, or every entry in the namespace.
    ///
    /// Removing an absent entry succeeds. Returns false when the cache is
    /// disabled or the store failed.
    pub async fn invalidate(&self, question: Option<&str>) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let result: AppResult<usize> = match question {
            Some(q) => {
                let key = self.key_for(q);
                with_deadline("cache delete", STORE_TIMEOUT, store.delete(&key))
                    .await
                    .map(usize::from)
            }
            None => {
                let prefix = self.prefix();
                with_deadline("cache clear", STORE_TIMEOUT, store.delete_prefix(&prefix)).await
            }
        };

        match result {
            Ok(removed) => {
                tracing::info!("Invalidated {} cached response(s)", removed);
                true
            }
            Err(e) => {
                tracing::warn!("Cache invalidation failed: {}", e);
                false
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let entries = match self.store.as_ref() {
            Some(store) => {
                let prefix = self.prefix();
                with_deadline("cache stats", STORE_TIMEOUT, store.count_prefix(&prefix))
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!("Failed to count cache entries: {}", e);
                        0
                    })
            }
            None => 0,
        };

        CacheStats {
            enabled: self.is_enabled(),
            backend: self
                .store
                .as_ref()
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| "none".to_string()),
            entries,
            hits,
            misses,
            hit_rate: format_hit_rate(hits, misses),
        }
    }
}

/// Hex SHA-256 of the trimmed, lowercased question.
pub fn question_digest(question: &str) -> String {
    let normalized = question.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn format_hit_rate(hits: u64, misses: u64) -> String {
    let total = hits + misses;
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", hits as f64 / total as f64 * 100.0)
}
