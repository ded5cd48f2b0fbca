//! Provider profile: the `[provider]` configuration section.

use super::{CompletionOptions, ModelProvider};
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderType {
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
            ProviderType::LocalCustom => "local",
        }
    }

    /// Environment variable holding the key when none is configured.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Ollama | ProviderType::LocalCustom => None,
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider_type: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inline API key; prefer `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable to read the API key from
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Base URL (OpenAI/Ollama) or full endpoint (local)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::default(),
            model: default_model(),
            api_key: None,
            api_key_env: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }
        if self.provider_type == ProviderType::LocalCustom && self.endpoint.is_none() {
            return Err("Local providers require an endpoint".to_string());
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }
        Ok(())
    }

    /// Inline key first, then the configured or default environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Some(key.to_string());
        }
        let env_name = self
            .api_key_env
            .as_deref()
            .or_else(|| self.provider_type.default_api_key_env())?;
        std::env::var(env_name).ok().filter(|k| !k.trim().is_empty())
    }

    pub fn to_model_provider(&self) -> Result<ModelProvider, ProviderError> {
        let missing_key = || {
            ProviderError::NotConfigured(format!(
                "No API key for {} (set provider.api_key or {})",
                self.provider_type,
                self.api_key_env
                    .as_deref()
                    .or_else(|| self.provider_type.default_api_key_env())
                    .unwrap_or("provider.api_key_env")
            ))
        };
        let provider = match self.provider_type {
            ProviderType::OpenAI => ModelProvider::OpenAI {
                model: self.model.clone(),
                api_key: self.resolve_api_key().ok_or_else(missing_key)?,
                base_url: self.endpoint.clone(),
            },
            ProviderType::Anthropic => ModelProvider::Anthropic {
                model: self.model.clone(),
                api_key: self.resolve_api_key().ok_or_else(missing_key)?,
            },
            ProviderType::Ollama => ModelProvider::Ollama {
                model: self.model.clone(),
                base_url: self.endpoint.clone(),
            },
            ProviderType::LocalCustom => ModelProvider::LocalCustom {
                model: self.model.clone(),
                endpoint: self.endpoint.clone().ok_or_else(|| {
                    ProviderError::NotConfigured("Local provider has no endpoint".to_string())
                })?,
                api_key: self.resolve_api_key(),
            },
        };
        Ok(provider)
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..CompletionOptions::default()
        }
    }

    /// Copy safe to print: the inline key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some("********".to_string());
        }
        copy
    }
}
