//! Generation Client
//!
//! The single call contract every component uses to reach the generative
//! capability: send a [`Prompt`], get back a JSON value (or a JSON string for
//! text-format prompts). Coercion into a typed artifact is left to
//! [`crate::schema::conform`].

use crate::error::PipelineError;
use crate::prompt::{Prompt, ResponseFormat};
use crate::provider::{ChatMessage, CompletionOptions, ModelProviderClient};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Ask the generative capability for output matching a prompt.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the parsed JSON body, or `Value::String` for text prompts.
    async fn generate(&self, prompt: &Prompt) -> Result<Value, PipelineError>;
}

/// [`GenerationClient`] backed by a [`ModelProviderClient`].
///
/// Holds no per-call state; one instance serves concurrent pipeline runs.
pub struct ProviderGenerationClient {
    provider: Arc<dyn ModelProviderClient>,
    options: CompletionOptions,
}

impl ProviderGenerationClient {
    pub fn new(provider: Arc<dyn ModelProviderClient>, options: CompletionOptions) -> Self {
        Self { provider, options }
    }

    fn messages(prompt: &Prompt) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(prompt.system.clone()),
            ChatMessage::user(prompt.user.clone()).with_images(prompt.images.clone()),
        ]
    }
}

#[async_trait]
impl GenerationClient for ProviderGenerationClient {
    async fn generate(&self, prompt: &Prompt) -> Result<Value, PipelineError> {
        let mut options = self.options.clone();
        options.json_response = prompt.format == ResponseFormat::Json;

        let response = self
            .provider
            .complete(Self::messages(prompt), options)
            .await?;

        debug!(
            provider = self.provider.provider_name(),
            model = %response.model,
            completion_tokens = response.usage.completion_tokens,
            "Completion received"
        );

        parse_response(&response.content, prompt.format)
    }
}

/// Strip Markdown code fences the model sometimes wraps its answer in.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "markdown", ...) on the opening fence line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Turn raw completion text into the value handed to schema conformance.
pub fn parse_response(raw: &str, format: ResponseFormat) -> Result<Value, PipelineError> {
    let cleaned = strip_code_fences(raw);
    match format {
        ResponseFormat::Text => Ok(Value::String(cleaned.to_string())),
        ResponseFormat::Json => serde_json::from_str(cleaned).map_err(|e| {
            PipelineError::GenerationFailure(format!("Response is not valid JSON: {}", e))
        }),
    }
}
