//! Question answering orchestration.
//!
//! One call walks the gate states: cache check, retrieval, scoring, a
//! routed answer, then caching. Failures degrade along the way: a cache
//! outage reads as a miss, a retrieval outage tries a single-query fallback
//! search, and a failed knowledge-base answer retries on the general route.
//! Only a failed general answer yields an error envelope, which is never
//! cached.

use crate::cache::{CacheStats, ResponseCache};
use crate::config::{AssistantConfig, GateConfig};
use crate::deadline::with_deadline;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::rag::gate::{GateState, RelevanceGate, Route, RouteOverride};
use crate::rag::generator::{AnswerGenerator, LlmAnswerGenerator};
use crate::rag::history::ChatHistory;
use crate::rag::search::SearchEngine;
use crate::rag::types::{ResponseEnvelope, SourceCitation};
use crate::types::{Chunk, ScoredCandidate, SearchHit};
use crate::vector_index::{EmbeddingIndex, MemoryIndex};
use mira_core::{AppConfig, AppError, AppResult};
use mira_prompt::ChatTurn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Snapshot of assistant state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantStats {
    pub generator: String,
    pub embedding_provider: String,
    pub indexed_chunks: usize,
    pub history_turns: usize,
    pub query_cache_entries: usize,
    pub cache: CacheStats,
}

/// Retrieval-augmented assistant over one index.
pub struct Assistant {
    engine: SearchEngine,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn EmbeddingIndex>,
    generator: Arc<dyn AnswerGenerator>,
    cache: ResponseCache,
    gate: RelevanceGate,
    settings: GateConfig,
    top_k: usize,
    history: Mutex<ChatHistory>,
}

impl Assistant {
    /// Assemble an assistant from its parts.
    pub fn new(
        config: &AssistantConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn EmbeddingIndex>,
        generator: Arc<dyn AnswerGenerator>,
        cache: ResponseCache,
    ) -> AppResult<Self> {
        config.validate()?;

        let timeout = Duration::from_secs(config.gate.timeout_secs);
        let engine = SearchEngine::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            config.retrieval.clone(),
            timeout,
        )?;

        Ok(Self {
            engine,
            embedder,
            index,
            generator,
            cache,
            gate: RelevanceGate::new(
                config.gate.relevance_threshold,
                config.gate.fallback_threshold,
            ),
            settings: config.gate.clone(),
            top_k: config.retrieval.top_k,
            history: Mutex::new(ChatHistory::new(config.gate.max_history_turns)),
        })
    }

    /// Build the default stack: configured embedding provider, in-memory
    /// index, LLM generator and the configured response cache.
    pub async fn from_config(app: &AppConfig, config: AssistantConfig) -> AppResult<Self> {
        let embedder = create_provider(&config.embedding).await?;
        let index: Arc<dyn EmbeddingIndex> = Arc::new(MemoryIndex::new(config.embedding.dimensions));
        let generator = LlmAnswerGenerator::from_config(
            app,
            config.gate.temperature,
            config.gate.max_tokens,
            config.prompts_dir.as_deref(),
        )?;
        let cache = ResponseCache::from_config(&config.cache);

        info!(
            embedding = embedder.provider_name(),
            generator = %generator.name(),
            cache = cache.is_enabled(),
            "Assistant ready"
        );
        Self::new(&config, embedder, index, Arc::new(generator), cache)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer a question, letting the relevance gate pick the route.
    pub async fn answer(&self, question: &str) -> ResponseEnvelope {
        self.answer_with(question, RouteOverride::Auto).await
    }

    /// Answer a question on a chosen route.
    ///
    /// Only `RouteOverride::Auto` reads or writes the response cache.
    #[instrument(skip(self))]
    pub async fn answer_with(&self, question: &str, route: RouteOverride) -> ResponseEnvelope {
        enter(GateState::AwaitingQuery);
        if question.trim().is_empty() {
            return ResponseEnvelope::error("Please ask a question.");
        }

        match route {
            RouteOverride::Auto => self.answer_auto(question).await,
            RouteOverride::KnowledgeBase => self.answer_forced_knowledge_base(question).await,
            RouteOverride::General => self.respond(question, Route::General).await.0,
        }
    }

    async fn answer_auto(&self, question: &str) -> ResponseEnvelope {
        enter(GateState::CacheCheck);
        if let Some(mut cached) = self.cache.get(question).await {
            enter(GateState::CacheHit);
            info!("Answered from cache");
            cached.from_cache = true;
            return cached;
        }

        enter(GateState::Retrieving);
        let route = self.retrieve_and_route(question).await;

        let (envelope, cacheable) = self.respond(question, route).await;
        if cacheable && self.cache.put(question, &envelope).await {
            enter(GateState::Cached);
        } else {
            enter(GateState::Uncached);
        }
        envelope
    }

    async fn retrieve_and_route(&self, question: &str) -> Route {
        match self.engine.select_and_run(question, self.top_k).await {
            Ok(candidates) => {
                enter(GateState::Scoring);
                self.gate.route(candidates)
            }
            Err(e) => {
                warn!("Retrieval failed, trying single-query fallback: {}", e);
                match self
                    .engine
                    .similarity_search(question, self.settings.fallback_top_k)
                    .await
                {
                    Ok(hits) => {
                        enter(GateState::Scoring);
                        self.gate.route_fallback(hits)
                    }
                    Err(e) => {
                        warn!("Fallback retrieval failed, answering from general knowledge: {}", e);
                        Route::General
                    }
                }
            }
        }
    }

    async fn answer_forced_knowledge_base(&self, question: &str) -> ResponseEnvelope {
        match self.engine.select_and_run(question, self.top_k).await {
            Ok(candidates) if !candidates.is_empty() => {
                self.respond(question, Route::KnowledgeBase(candidates)).await.0
            }
            Ok(_) => ResponseEnvelope::error("The knowledge base has no documents for this question."),
            Err(e) => {
                warn!("Knowledge base unavailable: {}", e);
                ResponseEnvelope::error(format!("The knowledge base is unavailable: {}", e))
            }
        }
    }

    /// Produce the envelope for a route and whether it may be cached.
    async fn respond(&self, question: &str, route: Route) -> (ResponseEnvelope, bool) {
        if let Route::KnowledgeBase(candidates) = route {
            enter(GateState::RoutedKnowledgeBase);
            info!(
                top_score = candidates.first().map(|c| c.hybrid_score),
                "Routing to knowledge base"
            );
            match self.answer_from_documents(question, &candidates).await {
                Ok(envelope) => return (envelope, true),
                Err(e) => warn!("Knowledge base answer failed, falling back to general: {}", e),
            }
        }

        enter(GateState::RoutedGeneral);
        info!("Routing to general knowledge");
        match self.answer_general(question).await {
            Ok(envelope) => (envelope, true),
            Err(e) => {
                warn!("General answer failed: {}", e);
                (
                    ResponseEnvelope::error(format!("Sorry, I could not generate an answer: {}", e)),
                    false,
                )
            }
        }
    }

    async fn answer_from_documents(
        &self,
        question: &str,
        candidates: &[ScoredCandidate],
    ) -> AppResult<ResponseEnvelope> {
        let top = &candidates[..candidates.len().min(self.settings.context_documents)];
        let context = build_context(top);

        let answer = self.generate(question, &context).await?;
        let sources = top
            .iter()
            .map(|c| SourceCitation::from_candidate(c, self.settings.snippet_chars))
            .collect();

        Ok(ResponseEnvelope::knowledge_base(answer, sources))
    }

    async fn answer_general(&self, question: &str) -> AppResult<ResponseEnvelope> {
        let answer = self.generate(question, "").await?;
        Ok(ResponseEnvelope::general(answer))
    }

    /// Run the generator with the current history and record the exchange.
    async fn generate(&self, question: &str, context: &str) -> AppResult<String> {
        let history = self.history.lock().await.turns();

        let answer = with_deadline(
            "answer generation",
            self.timeout(),
            self.generator.generate(question, context, &history),
        )
        .await?;

        self.history.lock().await.push(question, answer.as_str());
        Ok(answer)
    }

    /// Ranked passages for `query` without generating an answer.
    pub async fn search(&self, query: &str, k: usize) -> AppResult<Vec<SearchHit>> {
        let candidates = self.engine.select_and_run(query, k).await?;
        Ok(candidates.iter().map(SearchHit::from).collect())
    }

    /// Invalidate one cached answer, or everything when `question` is `None`.
    ///
    /// Clearing everything also drops memoised query results.
    pub async fn clear(&self, question: Option<&str>) -> bool {
        if question.is_none() {
            self.engine.clear_query_cache();
        }
        self.cache.invalidate(question).await
    }

    /// Signal that the index content changed.
    pub async fn documents_added(&self) -> bool {
        info!("Documents added, invalidating cached answers");
        self.clear(None).await
    }

    /// Embed and index `chunks`, then invalidate cached answers.
    ///
    /// Indexing stops at the first failed write. Cached answers are still
    /// invalidated when earlier chunks made it into the index.
    pub async fn ingest(&self, chunks: Vec<Chunk>) -> AppResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = with_deadline(
            "chunk embedding",
            self.timeout(),
            self.embedder.embed_batch(&texts),
        )
        .await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let total = chunks.len();
        let mut indexed = 0;
        let mut failure = None;
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            match self.index.upsert(chunk, embedding).await {
                Ok(()) => indexed += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Earlier writes are already visible to retrieval
        if indexed > 0 {
            info!("Indexed {} of {} chunk(s)", indexed, total);
            self.documents_added().await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(indexed),
        }
    }

    /// Forget the conversation and every cached answer.
    pub async fn clear_memory(&self) -> bool {
        self.history.lock().await.clear();
        self.clear(None).await
    }

    pub async fn history(&self) -> Vec<ChatTurn> {
        self.history.lock().await.turns()
    }

    pub async fn stats(&self) -> AppResult<AssistantStats> {
        Ok(AssistantStats {
            generator: self.generator.name(),
            embedding_provider: format!(
                "{}/{}",
                self.embedder.provider_name(),
                self.embedder.model_name()
            ),
            indexed_chunks: self.index.len().await?,
            history_turns: self.history.lock().await.len(),
            query_cache_entries: self.engine.query_cache_len(),
            cache: self.cache.stats().await,
        })
    }
}

fn enter(state: GateState) {
    debug!(%state, "Gate state");
}

/// Join passages into numbered context blocks for the prompt.
pub fn build_context(candidates: &[ScoredCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[Document {}]\n{}", i + 1, c.content()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
