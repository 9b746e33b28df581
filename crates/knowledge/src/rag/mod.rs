//! Retrieval-augmented answering.
//!
//! Query expansion, hybrid scoring and rank fusion feed a relevance gate
//! that routes each question to a grounded or a general answer.

pub mod ask;
pub mod expansion;
pub mod fusion;
pub mod gate;
pub mod generator;
pub mod history;
pub mod scoring;
pub mod search;
pub mod types;

pub use ask::{build_context, Assistant, AssistantStats};
pub use expansion::{ExpansionRule, QueryExpander};
pub use fusion::{average_fusion, reciprocal_rank_fusion, FusionStrategy, DEFAULT_RRF_K};
pub use gate::{GateState, RelevanceGate, Route, RouteOverride};
pub use generator::{AnswerGenerator, LlmAnswerGenerator};
pub use history::ChatHistory;
pub use scoring::{lexical_score, normalize_distances, HybridScorer};
pub use search::{SearchEngine, SearchStrategy};
pub use types::{ResponseEnvelope, SourceCitation, SourceType};
