//! Error types for the Mira assistant.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, answer generation, retrieval,
//! response caching, prompt rendering and serialization.

use thiserror::Error;

/// Unified error type for the Mira assistant.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// The routing layer converts these into degraded routes or `error`-tagged
/// envelopes; nothing here is fatal to the process.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider and answer generation errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors (ingestion, chunk handling)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Embedding index or embedding provider unavailable
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Response cache backend errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Prompt rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// An external call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
