//! Embedding configuration.

use serde::{Deserialize, Serialize};

/// Which embedding model turns text into vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint, for providers that call a server
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Config for a local Ollama embedding model.
    pub fn ollama(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider: "ollama".to_string(),
            model: model.into(),
            dimensions,
            endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, 384);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let config: EmbeddingConfig =
            serde_yaml::from_str("provider: ollama\nmodel: nomic-embed-text\ndimensions: 768\n")
                .unwrap();
        assert_eq!(config, EmbeddingConfig::ollama("nomic-embed-text", 768));
    }
}
