//! Embedding providers for queries and chunks.
//!
//! The provider is chosen once from [`EmbeddingConfig`] when the assistant is
//! built; the retrieval pipeline only sees the [`EmbeddingProvider`] trait.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
