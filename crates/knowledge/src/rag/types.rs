//! Answer envelope types.

use crate::types::ScoredCandidate;
use serde::{Deserialize, Serialize};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    KnowledgeBase,
    GeneralKnowledge,
    Error,
}

/// A document passage cited by a knowledge-base answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub source_id: String,

    #[serde(default)]
    pub page: Option<u32>,

    pub extraction_method: String,

    /// Leading text of the passage, truncated to the configured length
    pub snippet: String,

    /// Fused retrieval score of the passage
    pub relevance: f32,
}

impl SourceCitation {
    /// Cite a candidate, truncating its text to `snippet_chars` characters.
    pub fn from_candidate(candidate: &ScoredCandidate, snippet_chars: usize) -> Self {
        let meta = &candidate.chunk.metadata;
        Self {
            source_id: meta.source_id.clone(),
            page: meta.page_number,
            extraction_method: meta.extraction_method.clone(),
            snippet: truncate_snippet(&candidate.chunk.content, snippet_chars),
            relevance: candidate.combined_score,
        }
    }
}

/// Truncate on a character boundary, marking the cut with `...`.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// What the assistant returns for a question.
///
/// `from_cache` is set on the way out of the cache and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub answer: String,
    pub source_type: SourceType,
    pub sources: Vec<SourceCitation>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_cache: bool,
}

impl ResponseEnvelope {
    pub fn knowledge_base(answer: impl Into<String>, sources: Vec<SourceCitation>) -> Self {
        Self {
            answer: answer.into(),
            source_type: SourceType::KnowledgeBase,
            sources,
            from_cache: false,
        }
    }

    pub fn general(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            source_type: SourceType::GeneralKnowledge,
            sources: Vec::new(),
            from_cache: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            answer: message.into(),
            source_type: SourceType::Error,
            sources: Vec::new(),
            from_cache: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.source_type == SourceType::Error
    }
}
