//! Prompt builder for rendering templates and injecting context.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, ChatTurn, PromptDefinition};
use handlebars::Handlebars;
use mira_core::{AppError, AppResult};
use std::collections::HashMap;

/// Placeholder rendered when there is no prior conversation.
pub const EMPTY_HISTORY: &str = "No previous conversation";

/// Build a prompt from a definition, the question, optional retrieved
/// context and the chat history.
///
/// # Example
/// ```
/// use mira_prompt::{build_prompt, builtin_prompt, PromptKind};
///
/// let def = builtin_prompt(PromptKind::General);
/// let built = build_prompt(&def, "What is Rust?", None, &[]).unwrap();
/// assert_eq!(built.user, "What is Rust?");
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: Option<&str>,
    history: &[ChatTurn],
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("chat_history".to_string(), format_chat_history(history));

    let context_included = match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            variables.insert("context".to_string(), ctx.to_string());
            true
        }
        _ => false,
    };

    let system = render_template(&definition.system, &variables)?;
    let user = render_template(&definition.user, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            prompt_id: definition.id.clone(),
            context_included,
            history_turns: history.len(),
        },
    })
}

/// Format chat history as alternating `Human:`/`Assistant:` lines.
pub fn format_chat_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return EMPTY_HISTORY.to_string();
    }

    history
        .iter()
        .flat_map(|turn| {
            [
                format!("Human: {}", turn.question),
                format!("Assistant: {}", turn.answer),
            ]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text prompts, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
