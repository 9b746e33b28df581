//! LLM integration crate for the Mira assistant.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs). The provider is chosen once, when the client
//! is built, and every later call goes through the [`LlmClient`] trait.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: OpenAI and Groq chat completion endpoints
//!
//! # Example
//! ```no_run
//! use mira_llm::{create_client, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_client("ollama", None, None)?;
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
