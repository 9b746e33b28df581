//! Test doubles that count their calls.

use crate::cache::{CacheStore, MemoryStore, ResponseCache};
use crate::config::AssistantConfig;
use crate::embeddings::providers::TrigramProvider;
use crate::rag::{AnswerGenerator, Assistant};
use crate::types::{Chunk, ChunkMetadata};
use crate::vector_index::{EmbeddingIndex, MemoryIndex};
use async_trait::async_trait;
use mira_core::{AppError, AppResult};
use mira_prompt::ChatTurn;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REFUND_TEXT: &str =
    "What is the refund policy? Refunds are issued within 30 days of purchase.";
pub const SHIPPING_TEXT: &str = "Shipping takes five business days.";

/// Index that returns the same hits for every query.
pub struct StaticIndex {
    hits: Vec<(Arc<Chunk>, f32)>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl StaticIndex {
    pub fn new(entries: &[(&str, f32)]) -> Self {
        let hits = entries
            .iter()
            .enumerate()
            .map(|(i, (text, distance))| {
                let chunk = Chunk::new(
                    format!("chunk-{}", i),
                    *text,
                    ChunkMetadata::new("policy.pdf").with_page(i as u32 + 1),
                );
                (Arc::new(chunk), *distance)
            })
            .collect();

        Self {
            hits,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
        }
    }

    /// The refund and shipping passages at distances 0.1 and 0.4.
    pub fn policy() -> Self {
        Self::new(&[(REFUND_TEXT, 0.1), (SHIPPING_TEXT, 0.4)])
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Fail the first `n` searches.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingIndex for StaticIndex {
    async fn search(&self, _query: &[f32], top_k: usize) -> AppResult<Vec<(Arc<Chunk>, f32)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Retrieval("index offline".into()));
        }

        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    async fn upsert(&self, _chunk: Chunk, _embedding: Vec<f32>) -> AppResult<()> {
        Err(AppError::Knowledge("static index is read-only".into()))
    }

    async fn len(&self) -> AppResult<usize> {
        Ok(self.hits.len())
    }
}

/// In-memory index that rejects writes once it holds `capacity` chunks.
pub struct CappedIndex {
    inner: MemoryIndex,
    capacity: usize,
}

impl CappedIndex {
    pub fn new(dimensions: usize, capacity: usize) -> Self {
        Self {
            inner: MemoryIndex::new(dimensions),
            capacity,
        }
    }
}

#[async_trait]
impl EmbeddingIndex for CappedIndex {
    async fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(Arc<Chunk>, f32)>> {
        self.inner.search(query, top_k).await
    }

    async fn upsert(&self, chunk: Chunk, embedding: Vec<f32>) -> AppResult<()> {
        if self.inner.len().await? >= self.capacity {
            return Err(AppError::Knowledge("index is full".into()));
        }
        self.inner.upsert(chunk, embedding).await
    }

    async fn len(&self) -> AppResult<usize> {
        self.inner.len().await
    }
}

/// One recorded generator call.
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub question: String,
    pub context: String,
    pub history: Vec<ChatTurn>,
}

/// Generator with scripted failures.
#[derive(Default)]
pub struct ScriptedGenerator {
    fail_grounded: bool,
    fail_general: bool,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail whenever context is supplied.
    pub fn failing_grounded(mut self) -> Self {
        self.fail_grounded = true;
        self
    }

    /// Fail whenever no context is supplied.
    pub fn failing_general(mut self) -> Self {
        self.fail_general = true;
        self
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn generate(&self, question: &str, context: &str, history: &[ChatTurn]) -> AppResult<String> {
        self.calls.lock().unwrap().push(GeneratorCall {
            question: question.to_string(),
            context: context.to_string(),
            history: history.to_vec(),
        });

        let grounded = !context.is_empty();
        if (grounded && self.fail_grounded) || (!grounded && self.fail_general) {
            return Err(AppError::Llm("model overloaded".into()));
        }

        Ok(if grounded {
            "Refunds are issued within 30 days.".to_string()
        } else {
            "Here is what I know.".to_string()
        })
    }
}

/// Store whose every operation fails.
pub struct OfflineStore;

#[async_trait]
impl CacheStore for OfflineStore {
    fn name(&self) -> &str {
        "offline"
    }

    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::Cache("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> AppResult<()> {
        Err(AppError::Cache("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> AppResult<bool> {
        Err(AppError::Cache("connection refused".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> AppResult<usize> {
        Err(AppError::Cache("connection refused".into()))
    }

    async fn count_prefix(&self, _prefix: &str) -> AppResult<usize> {
        Err(AppError::Cache("connection refused".into()))
    }
}

pub fn memory_cache() -> ResponseCache {
    ResponseCache::new(Arc::new(MemoryStore::new()), "mira:qa", Duration::from_secs(3600))
}

pub fn build_assistant(
    config: AssistantConfig,
    index: Arc<dyn EmbeddingIndex>,
    generator: Arc<dyn AnswerGenerator>,
    cache: ResponseCache,
) -> Assistant {
    let embedder = Arc::new(TrigramProvider::new(64));
    Assistant::new(&config, embedder, index, generator, cache).unwrap()
}
