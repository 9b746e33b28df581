//! LLM provider factory.
//!
//! Builds the concrete [`LlmClient`] once, at assistant construction time.
//! Callers keep the returned `Arc` and never re-dispatch on the provider name.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use mira_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required by hosted providers)
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown provider: {}. Supported: ollama, openai, groq",
            provider
        ))
    })?;

    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
        ProviderType::OpenAI | ProviderType::Groq => {
            let key = api_key.ok_or_else(|| {
                AppError::Config(format!(
                    "{} provider requires API key",
                    provider_type.as_str()
                ))
            })?;
            Ok(Arc::new(OpenAiClient::new(
                provider_type.as_str(),
                base_url,
                key,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_groq_with_key() {
        let client = create_client("groq", None, Some("gsk-test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
