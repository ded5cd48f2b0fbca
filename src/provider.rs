//! Model Provider Abstraction
//!
//! Uniform interface over the remote generative capability (OpenAI, Anthropic,
//! local models via Ollama, custom OpenAI-compatible servers). Clients hold no
//! per-call mutable state and are shared across concurrent pipeline runs.

use crate::error::ProviderError;
use crate::types::PageImage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

mod anthropic;
mod openai;
pub mod profile;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiCompatibleClient;
pub use profile::{ProviderConfig, ProviderType};

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelProvider {
    OpenAI {
        model: String,
        api_key: String,
        base_url: Option<String>, // For custom endpoints (e.g., Azure OpenAI)
    },
    Anthropic {
        model: String,
        api_key: String,
    },
    Ollama {
        model: String,
        base_url: Option<String>, // Default: http://localhost:11434
    },
    LocalCustom {
        model: String,
        endpoint: String, // Full endpoint URL (e.g., http://localhost:8080/v1)
        api_key: Option<String>,
    },
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Chat message, optionally carrying page images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<PageImage>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<PageImage>) -> Self {
        self.images = images;
        self
    }
}

/// Completion options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
    /// Ask the provider for a JSON object response when it supports it
    #[serde(default)]
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_tokens: None,
            top_p: None,
            stop: None,
            json_response: false,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model name
    fn model_name(&self) -> &str;
}

// Map transport-level reqwest failures to ProviderError
pub(crate) fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        status_error(status, &error.to_string())
    } else if error.is_timeout() {
        ProviderError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ProviderError::RequestFailed(format!("Connection error: {}", error))
    } else {
        ProviderError::Other(format!("HTTP error: {}", error))
    }
}

// Map a non-success HTTP status and body to ProviderError
pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthFailed(format!("Authentication failed: {}", body)),
        429 => ProviderError::RateLimit(format!("Rate limit exceeded: {}", body)),
        404 => ProviderError::ModelNotFound(format!("Model not found: {}", body)),
        _ => ProviderError::RequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

pub(crate) fn build_provider_http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {}", e)))
}

/// Provider factory for creating provider clients
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_client(
        provider: &ModelProvider,
    ) -> Result<Arc<dyn ModelProviderClient>, ProviderError> {
        let client: Arc<dyn ModelProviderClient> = match provider {
            ModelProvider::OpenAI {
                model,
                api_key,
                base_url,
            } => Arc::new(OpenAiCompatibleClient::new(
                "openai",
                model.clone(),
                base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                Some(api_key.clone()),
            )?),
            ModelProvider::Anthropic { model, api_key } => {
                Arc::new(AnthropicClient::new(model.clone(), api_key.clone())?)
            }
            ModelProvider::Ollama { model, base_url } => {
                let base_url = base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                Arc::new(OpenAiCompatibleClient::new(
                    "ollama",
                    model.clone(),
                    format!("{}/v1", base_url.trim_end_matches('/')),
                    None,
                )?)
            }
            ModelProvider::LocalCustom {
                model,
                endpoint,
                api_key,
            } => Arc::new(OpenAiCompatibleClient::new(
                "local",
                model.clone(),
                endpoint.clone(),
                api_key.clone(),
            )?),
        };
        Ok(client)
    }
}
