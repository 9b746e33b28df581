//! Prompt system for the Mira assistant.
//!
//! This crate renders the prompts handed to the answer generator:
//! - Built-in Handlebars templates for the knowledge-base and general routes
//! - Optional YAML overrides loaded from a prompts directory
//! - Retrieved context and chat history injection

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, format_chat_history, EMPTY_HISTORY};
pub use loader::{builtin_prompt, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, ChatTurn, PromptDefinition, PromptKind};
