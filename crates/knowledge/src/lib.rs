//! Retrieval ranking and routing engine for the Mira assistant.
//!
//! Answers a question either from indexed documents or from general
//! knowledge:
//! - Query expansion into a few rule-based variants
//! - Hybrid semantic and lexical scoring
//! - Rank fusion (score averaging or reciprocal rank fusion)
//! - A relevance gate that routes to the knowledge-base or general prompt
//! - A TTL response cache keyed by the normalised question
//!
//! # Example
//! ```no_run
//! use mira_core::AppConfig;
//! use mira_knowledge::{config, Assistant, Chunk, ChunkMetadata};
//!
//! # async fn example() -> mira_core::AppResult<()> {
//! let app = AppConfig::load()?;
//! let assistant = Assistant::from_config(&app, config::load_config(&app.workspace)?).await?;
//!
//! assistant
//!     .ingest(vec![Chunk::new(
//!         "policy-1",
//!         "Refunds are issued within 30 days of purchase.",
//!         ChunkMetadata::new("policy.pdf").with_page(1),
//!     )])
//!     .await?;
//!
//! let envelope = assistant.answer("What is the refund policy?").await;
//! println!("{} ({:?})", envelope.answer, envelope.source_type);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
mod deadline;
pub mod embeddings;
pub mod rag;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStore, FileStore, MemoryStore, ResponseCache};
pub use config::{AssistantConfig, CacheBackend, CacheConfig, GateConfig, RetrievalConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use rag::{
    AnswerGenerator, Assistant, AssistantStats, LlmAnswerGenerator, ResponseEnvelope,
    RouteOverride, SearchEngine, SearchStrategy, SourceCitation, SourceType,
};
pub use types::{Chunk, ChunkMetadata, QueryVariant, ScoredCandidate, SearchHit};
pub use vector_index::{EmbeddingIndex, MemoryIndex};
