//! Relevance gate: decides between knowledge-base and general answers.

use crate::types::{Chunk, ScoredCandidate};
use std::fmt;
use std::sync::Arc;

/// Answer route chosen for a question.
#[derive(Debug, Clone)]
pub enum Route {
    /// Answer from these passages, best first
    KnowledgeBase(Vec<ScoredCandidate>),
    General,
}

/// Caller's choice of route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteOverride {
    /// Let the gate decide; answers are cached
    #[default]
    Auto,
    /// Always answer from the knowledge base; not cached
    KnowledgeBase,
    /// Always answer without retrieval; not cached
    General,
}

/// Stages of answering one question, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    AwaitingQuery,
    CacheCheck,
    CacheHit,
    Retrieving,
    Scoring,
    RoutedKnowledgeBase,
    RoutedGeneral,
    Cached,
    Uncached,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingQuery => "awaiting_query",
            Self::CacheCheck => "cache_check",
            Self::CacheHit => "cache_hit",
            Self::Retrieving => "retrieving",
            Self::Scoring => "scoring",
            Self::RoutedKnowledgeBase => "routed_knowledge_base",
            Self::RoutedGeneral => "routed_general",
            Self::Cached => "cached",
            Self::Uncached => "uncached",
        };
        f.write_str(name)
    }
}

/// Threshold test on retrieval scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceGate {
    threshold: f32,
    fallback_threshold: f32,
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self::new(0.3, 0.2)
    }
}

impl RelevanceGate {
    pub fn new(threshold: f32, fallback_threshold: f32) -> Self {
        Self {
            threshold,
            fallback_threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Whether a top score clears the threshold (inclusive).
    pub fn admits(&self, top_score: f32) -> bool {
        top_score >= self.threshold
    }

    /// Route on fused candidates, ordered best first.
    ///
    /// Only the top candidate's hybrid score is compared.
    pub fn route(&self, candidates: Vec<ScoredCandidate>) -> Route {
        match candidates.first() {
            Some(top) if self.admits(top.hybrid_score) => Route::KnowledgeBase(candidates),
            Some(top) => {
                tracing::debug!(
                    score = top.hybrid_score,
                    threshold = self.threshold,
                    "Top candidate below relevance threshold"
                );
                Route::General
            }
            None => Route::General,
        }
    }

    /// Route on raw nearest-neighbour hits from the fallback search.
    ///
    /// Similarity is `1 - distance`; hits below the fallback threshold are
    /// dropped, and nothing left means the general route.
    pub fn route_fallback(&self, hits: Vec<(Arc<Chunk>, f32)>) -> Route {
        let kept: Vec<ScoredCandidate> = hits
            .into_iter()
            .filter_map(|(chunk, distance)| {
                let similarity = 1.0 - distance;
                (similarity >= self.fallback_threshold)
                    .then(|| ScoredCandidate::new(chunk, distance, similarity))
            })
            .collect();

        if kept.is_empty() {
            Route::General
        } else {
            Route::KnowledgeBase(kept)
        }
    }
}
