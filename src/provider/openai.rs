//! OpenAI-compatible chat completions client (OpenAI, Ollama, custom local servers).

use super::{
    build_provider_http_client, error_body, map_http_error, status_error, ChatMessage,
    CompletionOptions, CompletionResponse, ModelProviderClient, TokenUsage,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    // Plain string, or an array of text/image parts when images are attached
    content: Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn to_wire(message: ChatMessage) -> WireMessage {
    let content = if message.images.is_empty() {
        Value::String(message.content)
    } else {
        let mut parts = vec![json!({ "type": "text", "text": message.content })];
        parts.extend(message.images.iter().map(|image| {
            json!({
                "type": "image_url",
                "image_url": { "url": image.to_data_uri() }
            })
        }));
        Value::Array(parts)
    };
    WireMessage {
        role: message.role.as_str(),
        content,
    }
}

/// Client for any endpoint speaking the `/chat/completions` protocol
pub struct OpenAiCompatibleClient {
    client: Client,
    provider_name: &'static str,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider_name: &'static str,
        model: String,
        base_url: String,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = build_provider_http_client()?;
        Ok(Self {
            client,
            provider_name,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.into_iter().map(to_wire).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: options.stop,
            response_format: options
                .json_response
                .then(|| json!({ "type": "json_object" })),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelProviderClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self.build_request(messages, options);
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(status_error(status, &body));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: completion.model,
            usage: completion.usage.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
