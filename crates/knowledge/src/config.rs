//! Assistant configuration management.
//!
//! Retrieval, routing and cache settings live in `.mira/assistant.yaml`.
//! Every field has a default, so a missing file or a partial file is fine.

use crate::embeddings::EmbeddingConfig;
use crate::rag::search::SearchStrategy;
use mira_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level assistant configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub gate: GateConfig,
    pub cache: CacheConfig,

    /// Directory with prompt overrides (`<id>.yaml`), relative to the workspace
    pub prompts_dir: Option<PathBuf>,
}

/// Query expansion, scoring and fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates returned by a search
    pub top_k: usize,

    pub semantic_weight: f32,
    pub keyword_weight: f32,

    /// Smoothing constant for reciprocal rank fusion
    pub rrf_k: f32,

    /// Upper bound on query variants, original included
    pub max_variants: usize,

    /// Queries with at most this many tokens use score averaging
    pub short_query_max_tokens: usize,

    /// Long queries use RRF when set, plain hybrid search otherwise
    pub use_rrf: bool,

    /// Pin a strategy instead of selecting by query length
    pub strategy: Option<SearchStrategy>,

    /// Entries in the per-(query, k) result cache; 0 disables it
    pub query_cache_capacity: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            rrf_k: 60.0,
            max_variants: 3,
            short_query_max_tokens: 3,
            use_rrf: true,
            strategy: None,
            query_cache_capacity: 256,
        }
    }
}

/// Relevance gate and answer generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum top hybrid score for the knowledge-base route (inclusive)
    pub relevance_threshold: f32,

    /// Minimum similarity on the single-query fallback path (inclusive)
    pub fallback_threshold: f32,

    /// Results requested by the fallback search
    pub fallback_top_k: usize,

    /// Candidates turned into context and citations
    pub context_documents: usize,

    /// Citation snippet length in characters
    pub snippet_chars: usize,

    /// Exchanges kept in conversation memory
    pub max_history_turns: usize,

    pub temperature: f32,
    pub max_tokens: Option<u32>,

    /// Deadline for each external call
    pub timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.3,
            fallback_threshold: 0.2,
            fallback_top_k: 2,
            context_documents: 3,
            snippet_chars: 300,
            max_history_turns: 5,
            temperature: 0.3,
            max_tokens: None,
            timeout_secs: 30,
        }
    }
}

/// Where cached responses are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub namespace: String,
    pub ttl_hours: u64,
    pub backend: CacheBackend,

    /// Directory for the file backend; defaults to `.mira/cache`
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "mira:qa".to_string(),
            ttl_hours: 24,
            backend: CacheBackend::Memory,
            path: None,
        }
    }
}

impl AssistantConfig {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be at least 1".into()));
        }
        if r.max_variants == 0 {
            return Err(AppError::Config(
                "retrieval.max_variants must be at least 1".into(),
            ));
        }
        for (name, weight) in [
            ("semantic_weight", r.semantic_weight),
            ("keyword_weight", r.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "retrieval.{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if !r.rrf_k.is_finite() || r.rrf_k < 0.0 {
            return Err(AppError::Config(format!(
                "retrieval.rrf_k must be a non-negative number, got {}",
                r.rrf_k
            )));
        }

        let g = &self.gate;
        for (name, threshold) in [
            ("relevance_threshold", g.relevance_threshold),
            ("fallback_threshold", g.fallback_threshold),
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(AppError::Config(format!(
                    "gate.{} must be within [0, 1], got {}",
                    name, threshold
                )));
            }
        }
        if g.context_documents == 0 {
            return Err(AppError::Config(
                "gate.context_documents must be at least 1".into(),
            ));
        }
        if g.timeout_secs == 0 {
            return Err(AppError::Config("gate.timeout_secs must be positive".into()));
        }

        if self.cache.enabled {
            if self.cache.namespace.trim().is_empty() {
                return Err(AppError::Config("cache.namespace must not be empty".into()));
            }
            if self.cache.ttl_hours == 0 {
                return Err(AppError::Config("cache.ttl_hours must be positive".into()));
            }
            if self.cache.backend == CacheBackend::File && self.cache.path.is_none() {
                return Err(AppError::Config(
                    "cache.path is required for the file backend".into(),
                ));
            }
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Load the assistant configuration for a workspace.
///
/// Relative paths in the file are resolved against the workspace.
pub fn load_config(workspace: &Path) -> AppResult<AssistantConfig> {
    let config_path = get_config_path(workspace);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: AssistantConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        tracing::debug!("Loaded assistant config from {:?}", config_path);
        config
    } else {
        tracing::debug!("No assistant config at {:?}, using defaults", config_path);
        AssistantConfig::default()
    };

    if let Some(dir) = config.prompts_dir.take() {
        config.prompts_dir = Some(resolve(workspace, dir));
    }
    let cache_dir = config
        .cache
        .path
        .take()
        .unwrap_or_else(|| PathBuf::from(".mira").join("cache"));
    config.cache.path = Some(resolve(workspace, cache_dir));

    config.validate()?;
    Ok(config)
}

/// Save the assistant configuration.
pub fn save_config(workspace: &Path, config: &AssistantConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved assistant config to {:?}", config_path);
    Ok(())
}

/// Path to the assistant config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".mira").join("assistant.yaml")
}

fn resolve(workspace: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        workspace.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.gate.relevance_threshold, 0.3);
        assert_eq!(config.cache.namespace, "mira:qa");
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(
            config.cache.path,
            Some(temp.path().join(".mira").join("cache"))
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".mira")).unwrap();
        fs::write(
            get_config_path(temp.path()),
            "retrieval:\n  strategy: averaging\n  top_k: 8\ncache:\n  backend: file\n",
        )
        .unwrap();

        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.strategy, Some(SearchStrategy::Averaging));
        assert_eq!(config.retrieval.max_variants, 3);
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.gate.fallback_top_k, 2);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp = TempDir::new().unwrap();
        let mut config = AssistantConfig::default();
        config.gate.max_history_turns = 9;
        config.retrieval.use_rrf = false;

        save_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path()).unwrap();
        assert_eq!(loaded.gate.max_history_turns, 9);
        assert!(!loaded.retrieval.use_rrf);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AssistantConfig::default();
        config.gate.relevance_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = AssistantConfig::default();
        config.retrieval.keyword_weight = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keyword_weight"));
    }

    #[test]
    fn test_file_backend_needs_path() {
        let mut config = AssistantConfig::default();
        config.cache.backend = CacheBackend::File;
        assert!(config.validate().is_err());

        config.cache.path = Some(PathBuf::from("/tmp/mira-cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_cache_skips_cache_checks() {
        let mut config = AssistantConfig::default();
        config.cache.enabled = false;
        config.cache.ttl_hours = 0;
        assert!(config.validate().is_ok());
    }
}
