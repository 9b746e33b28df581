//! Prompt types for the Mira assistant.

use serde::{Deserialize, Serialize};

/// Which answer route a prompt serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Grounded answer over retrieved passages
    KnowledgeBase,
    /// Open-domain answer with no retrieved context
    General,
}

impl PromptKind {
    /// Stable identifier, also the file stem for YAML overrides.
    pub fn id(&self) -> &'static str {
        match self {
            Self::KnowledgeBase => "answer.knowledge_base",
            Self::General => "answer.general",
        }
    }
}

/// A prompt definition: a Handlebars system template plus a user template.
///
/// Templates may reference `{{question}}`, `{{context}}` and `{{chat_history}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    #[serde(default)]
    pub title: String,

    /// System message template
    pub system: String,

    /// User message template
    #[serde(default = "default_user_template")]
    pub user: String,
}

fn default_user_template() -> String {
    "{{question}}".to_string()
}

/// One prior exchange in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// What the user asked
    pub question: String,

    /// What the assistant answered
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A prompt after template rendering, ready for an LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// Rendered system message
    pub system: String,

    /// Rendered user message
    pub user: String,

    /// Metadata about how the prompt was built
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// ID of the prompt definition used
    pub prompt_id: String,

    /// Whether retrieved context was injected
    pub context_included: bool,

    /// Number of history turns rendered
    pub history_turns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_ids_are_distinct() {
        assert_ne!(PromptKind::KnowledgeBase.id(), PromptKind::General.id());
    }

    #[test]
    fn test_definition_defaults_user_template() {
        let def: PromptDefinition =
            serde_yaml::from_str("id: custom\nsystem: \"Be brief. {{chat_history}}\"\n").unwrap();
        assert_eq!(def.user, "{{question}}");
        assert!(def.title.is_empty());
    }
}
