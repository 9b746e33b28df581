//! Prompt definitions: built-in templates and YAML overrides.

use crate::types::{PromptDefinition, PromptKind};
use mira_core::{AppError, AppResult};
use std::path::Path;

const KNOWLEDGE_BASE_SYSTEM: &str = "\
You are a helpful personal assistant with access to a knowledge base.

Use the following context from the knowledge base to answer the question.
Be accurate and cite information from the context when possible.

Context:
{{context}}

Chat History:
{{chat_history}}";

const GENERAL_SYSTEM: &str = "\
You are a helpful, friendly personal assistant.

You can answer any question the user asks - general knowledge, advice,
coding help, explanations, creative tasks, etc.

Be conversational and helpful. If you don't know something, say so honestly.

Previous conversation:
{{chat_history}}";

/// The built-in definition for a route.
pub fn builtin_prompt(kind: PromptKind) -> PromptDefinition {
    let (title, system) = match kind {
        PromptKind::KnowledgeBase => ("Knowledge base answer", KNOWLEDGE_BASE_SYSTEM),
        PromptKind::General => ("General answer", GENERAL_SYSTEM),
    };

    PromptDefinition {
        id: kind.id().to_string(),
        title: title.to_string(),
        system: system.to_string(),
        user: "{{question}}".to_string(),
    }
}

/// Load the prompt for `kind`.
///
/// Looks for `<prompts_dir>/<id>.yaml` first and falls back to the built-in
/// definition when no override directory is given or the file is absent.
pub fn load_prompt(prompts_dir: Option<&Path>, kind: PromptKind) -> AppResult<PromptDefinition> {
    let Some(dir) = prompts_dir else {
        return Ok(builtin_prompt(kind));
    };

    let path = dir.join(format!("{}.yaml", kind.id()));
    if !path.exists() {
        tracing::debug!("No override at {:?}, using built-in prompt", path);
        return Ok(builtin_prompt(kind));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| AppError::Prompt(format!("Failed to read prompt {:?}: {}", path, e)))?;

    let definition: PromptDefinition = serde_yaml::from_str(&content)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt {:?}: {}", path, e)))?;

    if definition.id != kind.id() {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            path,
            definition.id,
            kind.id()
        )));
    }

    tracing::debug!("Loaded prompt override '{}'", definition.id);
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_reference_history() {
        let kb = builtin_prompt(PromptKind::KnowledgeBase);
        assert!(kb.system.contains("{{context}}"));
        assert!(kb.system.contains("{{chat_history}}"));

        let general = builtin_prompt(PromptKind::General);
        assert!(!general.system.contains("{{context}}"));
        assert!(general.system.contains("{{chat_history}}"));
    }

    #[test]
    fn test_load_without_dir_is_builtin() {
        let def = load_prompt(None, PromptKind::General).unwrap();
        assert_eq!(def.id, "answer.general");
    }

    #[test]
    fn test_load_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("answer.general.yaml"),
            "id: answer.general\ntitle: Pirate\nsystem: \"Talk like a pirate.\"\n",
        )
        .unwrap();

        let def = load_prompt(Some(temp.path()), PromptKind::General).unwrap();
        assert_eq!(def.title, "Pirate");
        assert_eq!(def.system, "Talk like a pirate.");

        // The other route has no override
        let kb = load_prompt(Some(temp.path()), PromptKind::KnowledgeBase).unwrap();
        assert_eq!(kb.title, "Knowledge base answer");
    }

    #[test]
    fn test_load_override_with_wrong_id() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("answer.general.yaml"),
            "id: something.else\nsystem: x\n",
        )
        .unwrap();

        assert!(load_prompt(Some(temp.path()), PromptKind::General).is_err());
    }
}
