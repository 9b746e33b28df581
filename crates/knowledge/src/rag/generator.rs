//! Answer generation over an LLM.

use async_trait::async_trait;
use mira_core::{AppConfig, AppError, AppResult};
use mira_llm::{create_client, LlmClient, LlmRequest};
use mira_prompt::{build_prompt, load_prompt, ChatTurn, PromptDefinition, PromptKind};
use std::path::Path;
use std::sync::Arc;

/// Produces an answer for a question.
///
/// A non-blank `context` selects the knowledge-base prompt; blank context
/// selects the general prompt.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Name for logs and stats, e.g. "ollama/llama3".
    fn name(&self) -> String;

    async fn generate(&self, question: &str, context: &str, history: &[ChatTurn])
        -> AppResult<String>;
}

/// [`AnswerGenerator`] backed by an [`LlmClient`] and Handlebars prompts.
pub struct LlmAnswerGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    knowledge_prompt: PromptDefinition,
    general_prompt: PromptDefinition,
}

impl LlmAnswerGenerator {
    /// Use the built-in prompts.
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            knowledge_prompt: mira_prompt::builtin_prompt(PromptKind::KnowledgeBase),
            general_prompt: mira_prompt::builtin_prompt(PromptKind::General),
        }
    }

    /// Build from application config, reading prompt overrides from
    /// `prompts_dir` when given.
    pub fn from_config(
        app: &AppConfig,
        temperature: f32,
        max_tokens: Option<u32>,
        prompts_dir: Option<&Path>,
    ) -> AppResult<Self> {
        let client = create_client(&app.provider, app.endpoint.as_deref(), app.api_key.as_deref())?;

        let mut generator = Self::new(client, app.model.clone());
        generator.temperature = temperature;
        generator.max_tokens = max_tokens;
        generator.knowledge_prompt = load_prompt(prompts_dir, PromptKind::KnowledgeBase)?;
        generator.general_prompt = load_prompt(prompts_dir, PromptKind::General)?;
        Ok(generator)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn request_for(&self, question: &str, context: &str, history: &[ChatTurn]) -> AppResult<LlmRequest> {
        let (definition, context) = if context.trim().is_empty() {
            (&self.general_prompt, None)
        } else {
            (&self.knowledge_prompt, Some(context))
        };

        let built = build_prompt(definition, question, context, history)?;
        tracing::debug!(
            prompt = %built.metadata.prompt_id,
            history_turns = built.metadata.history_turns,
            "Built answer prompt"
        );

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_system(built.system)
            .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        Ok(request)
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    fn name(&self) -> String {
        format!("{}/{}", self.client.provider_name(), self.model)
    }

    async fn generate(
        &self,
        question: &str,
        context: &str,
        history: &[ChatTurn],
    ) -> AppResult<String> {
        let request = self.request_for(question, context, history)?;
        let response = self.client.complete(&request).await?;

        tracing::debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "LLM usage"
        );

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(AppError::Llm(format!(
                "{} returned an empty completion",
                self.name()
            )));
        }
        Ok(answer.to_string())
    }
}
