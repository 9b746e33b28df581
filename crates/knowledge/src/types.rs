//! Core data types for the knowledge base and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Metadata carried by every indexed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source document identifier (file name, URL, ...)
    pub source_id: String,

    /// Page number within the source, when the source is paginated
    #[serde(default)]
    pub page_number: Option<u32>,

    /// How the text was extracted ("text", "ocr", ...)
    #[serde(default = "default_extraction_method")]
    pub extraction_method: String,
}

fn default_extraction_method() -> String {
    "text".to_string()
}

impl ChunkMetadata {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            page_number: None,
            extraction_method: default_extraction_method(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page_number = Some(page);
        self
    }

    pub fn with_extraction_method(mut self, method: impl Into<String>) -> Self {
        self.extraction_method = method.into();
        self
    }
}

/// A unit of indexed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: String,

    /// Text content
    pub content: String,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

/// A retrieved chunk with its scores.
///
/// `combined_score` orders results: it is the hybrid score for single-query
/// and averaging searches, and the reciprocal-rank sum after RRF.
/// `hybrid_score` is always on the hybrid scale (mean over the variants that
/// retrieved the chunk) and is what the relevance gate compares.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Arc<Chunk>,

    /// Raw index distance (lower is closer); the closest seen across variants
    pub semantic_distance: f32,

    pub combined_score: f32,

    pub hybrid_score: f32,
}

impl ScoredCandidate {
    /// A candidate scored by a single hybrid search.
    pub fn new(chunk: Arc<Chunk>, semantic_distance: f32, score: f32) -> Self {
        Self {
            chunk,
            semantic_distance,
            combined_score: score,
            hybrid_score: score,
        }
    }

    pub fn content(&self) -> &str {
        &self.chunk.content
    }
}

/// One rewriting of the user query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariant {
    pub text: String,

    /// Pattern of the rule that produced this variant; `None` for the original
    pub rule: Option<String>,
}

impl QueryVariant {
    pub fn original(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rule: None,
        }
    }

    pub fn rewritten(text: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rule: Some(rule.into()),
        }
    }

    pub fn is_original(&self) -> bool {
        self.rule.is_none()
    }
}

impl fmt::Display for QueryVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A ranked search hit as exposed to callers of `Assistant::search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub source_id: String,
    pub page: Option<u32>,
    pub score: f32,
}

impl From<&ScoredCandidate> for SearchHit {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            content: candidate.chunk.content.clone(),
            source_id: candidate.chunk.metadata.source_id.clone(),
            page: candidate.chunk.metadata.page_number,
            score: candidate.combined_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults_from_yaml() {
        let meta: ChunkMetadata = serde_yaml::from_str("source_id: handbook.pdf").unwrap();
        assert_eq!(meta.source_id, "handbook.pdf");
        assert_eq!(meta.page_number, None);
        assert_eq!(meta.extraction_method, "text");
    }

    #[test]
    fn test_search_hit_from_candidate() {
        let chunk = Chunk::new(
            "c1",
            "Refunds within 30 days.",
            ChunkMetadata::new("policy.pdf").with_page(4),
        );
        let candidate = ScoredCandidate::new(Arc::new(chunk), 0.12, 0.88);

        let hit = SearchHit::from(&candidate);
        assert_eq!(hit.source_id, "policy.pdf");
        assert_eq!(hit.page, Some(4));
        assert_eq!(hit.score, 0.88);
    }

    #[test]
    fn test_variant_origin() {
        assert!(QueryVariant::original("why rust").is_original());
        let rewritten = QueryVariant::rewritten("reason rust", "why");
        assert!(!rewritten.is_original());
        assert_eq!(rewritten.to_string(), "reason rust");
    }
}
