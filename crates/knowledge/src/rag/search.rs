//! Retrieval engine: strategy selection, hybrid search and fusion.

use crate::config::RetrievalConfig;
use crate::deadline::with_deadline;
use crate::embeddings::EmbeddingProvider;
use crate::rag::expansion::QueryExpander;
use crate::rag::fusion::FusionStrategy;
use crate::rag::scoring::{normalize_distances, HybridScorer};
use crate::types::{Chunk, ScoredCandidate};
use crate::vector_index::EmbeddingIndex;
use futures::future::try_join_all;
use lru::LruCache;
use mira_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Which retrieval procedure runs for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Expand, hybrid-search each variant, average scores
    Averaging,
    /// Expand, hybrid-search each variant, reciprocal rank fusion
    ReciprocalRank,
    /// Hybrid search over the original query only
    Hybrid,
}

type QueryKey = (String, usize);

/// Runs searches against one embedding provider and one index.
pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn EmbeddingIndex>,
    expander: QueryExpander,
    scorer: HybridScorer,
    config: RetrievalConfig,
    timeout: Duration,
    query_cache: Option<Mutex<LruCache<QueryKey, Vec<ScoredCandidate>>>>,
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn EmbeddingIndex>,
        config: RetrievalConfig,
        timeout: Duration,
    ) -> AppResult<Self> {
        let scorer = HybridScorer::new(config.semantic_weight, config.keyword_weight)?;
        let expander = QueryExpander::new(
            crate::rag::expansion::default_rules(),
            config.max_variants,
        );
        let query_cache =
            NonZeroUsize::new(config.query_cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));

        Ok(Self {
            embedder,
            index,
            expander,
            scorer,
            config,
            timeout,
            query_cache,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Pick the strategy for `query`.
    ///
    /// A configured strategy wins. Otherwise queries of at most
    /// `short_query_max_tokens` whitespace tokens use averaging and longer
    /// ones use RRF, or plain hybrid search when RRF is turned off.
    pub fn select_strategy(&self, query: &str) -> SearchStrategy {
        if let Some(strategy) = self.config.strategy {
            return strategy;
        }

        let tokens = query.split_whitespace().count();
        if tokens <= self.config.short_query_max_tokens {
            SearchStrategy::Averaging
        } else if self.config.use_rrf {
            SearchStrategy::ReciprocalRank
        } else {
            SearchStrategy::Hybrid
        }
    }

    /// Select a strategy for `query` and return up to `k` ranked candidates.
    pub async fn select_and_run(&self, query: &str, k: usize) -> AppResult<Vec<ScoredCandidate>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let strategy = self.select_strategy(query);
        tracing::debug!(?strategy, "Running search");

        let fusion = match strategy {
            SearchStrategy::Hybrid => return self.hybrid_search(query, k).await,
            SearchStrategy::Averaging => FusionStrategy::Averaging,
            SearchStrategy::ReciprocalRank => FusionStrategy::ReciprocalRank {
                k: self.config.rrf_k,
            },
        };

        let variants = self.expander.expand(query);
        // Over-fetch per variant so fusion has overlap to work with
        let lists = try_join_all(
            variants
                .iter()
                .map(|variant| self.hybrid_search(&variant.text, k.saturating_mul(2))),
        )
        .await?;

        let fused = fusion.fuse(&lists, k);
        tracing::debug!(
            variants = variants.len(),
            results = fused.len(),
            top = fused.first().map(|c| c.combined_score),
            "Fused search results"
        );
        Ok(fused)
    }

    /// Single-query hybrid search.
    ///
    /// Pulls `2k` nearest chunks, converts distances to similarities and
    /// re-ranks by hybrid score. Duplicate content keeps its best score.
    pub async fn hybrid_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredCandidate>> {
        let key = (query.to_string(), k);
        if let Some(hit) = self.cached(&key) {
            tracing::trace!("Query cache hit for {:?}", query);
            return Ok(hit);
        }

        let hits = self.similarity_search(query, k.saturating_mul(2)).await?;
        let results = self.rerank(query, hits, k);

        self.remember(key, &results);
        Ok(results)
    }

    /// Nearest chunks by raw index distance, without re-ranking.
    pub async fn similarity_search(&self, query: &str, k: usize) -> AppResult<Vec<(Arc<Chunk>, f32)>> {
        let embedding = with_deadline("query embedding", self.timeout, async {
            self.embedder
                .embed(query)
                .await
                .map_err(|e| AppError::Retrieval(format!("Failed to embed query: {}", e)))
        })
        .await?;

        with_deadline("index search", self.timeout, async {
            self.index
                .search(&embedding, k)
                .await
                .map_err(|e| AppError::Retrieval(format!("Index search failed: {}", e)))
        })
        .await
    }

    fn rerank(&self, query: &str, hits: Vec<(Arc<Chunk>, f32)>, k: usize) -> Vec<ScoredCandidate> {
        let distances: Vec<f32> = hits.iter().map(|(_, d)| *d).collect();
        let similarities = normalize_distances(&distances);

        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut ranked: Vec<ScoredCandidate> = Vec::with_capacity(hits.len());

        for ((chunk, distance), similarity) in hits.into_iter().zip(similarities) {
            let score = self.scorer.score(query, &chunk.content, similarity);
            match slots.get(&chunk.content) {
                Some(&slot) => {
                    if score > ranked[slot].combined_score {
                        ranked[slot] = ScoredCandidate::new(chunk, distance, score);
                    }
                }
                None => {
                    slots.insert(chunk.content.clone(), ranked.len());
                    ranked.push(ScoredCandidate::new(chunk, distance, score));
                }
            }
        }

        ranked.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        ranked.truncate(k);
        ranked
    }

    fn cached(&self, key: &QueryKey) -> Option<Vec<ScoredCandidate>> {
        let cache = self.query_cache.as_ref()?;
        let mut cache = cache.lock().ok()?;
        cache.get(key).cloned()
    }

    fn remember(&self, key: QueryKey, results: &[ScoredCandidate]) {
        if let Some(Ok(mut cache)) = self.query_cache.as_ref().map(|c| c.lock()) {
            cache.put(key, results.to_vec());
        }
    }

    /// Drop every memoised query result.
    pub fn clear_query_cache(&self) {
        if let Some(Ok(mut cache)) = self.query_cache.as_ref().map(|c| c.lock()) {
            let dropped = cache.len();
            cache.clear();
            tracing::debug!("Cleared {} memoised query result(s)", dropped);
        }
    }

    pub fn query_cache_len(&self) -> usize {
        match self.query_cache.as_ref().map(|c| c.lock()) {
            Some(Ok(cache)) => cache.len(),
            _ => 0,
        }
    }
}
