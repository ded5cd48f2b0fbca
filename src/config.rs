//! Configuration System
//!
//! Layered configuration (defaults, global file, workspace files, environment)
//! for the provider, the pipeline's quality gate and deadlines, prompt budgets
//! and logging.

use crate::logging::LoggingConfig;
use crate::pipeline::PipelineSettings;
use crate::prompt::PromptBudgets;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudiaConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Excerpt budgets and output language
    #[serde(default)]
    pub prompts: PromptBudgets,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quality gate, deadlines and extraction fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum validator score (with is_valid) that skips refinement
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,

    #[serde(default = "default_true")]
    pub refinement_enabled: bool,

    /// Deadline for each remote call, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Pages extracted in parallel
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,
}

fn default_quality_threshold() -> u8 {
    90
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_extraction_concurrency() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            refinement_enabled: default_true(),
            call_timeout_secs: default_call_timeout_secs(),
            extraction_concurrency: default_extraction_concurrency(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.quality_threshold > 100 {
            return Err(format!(
                "quality_threshold must be between 0 and 100, got {}",
                self.quality_threshold
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err("call_timeout_secs must be greater than zero".to_string());
        }
        if self.extraction_concurrency == 0 {
            return Err("extraction_concurrency must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Pipeline(String),
    Prompts(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Prompts(msg) => write!(f, "Prompts: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StudiaConfig {
    /// Validate the entire configuration, collecting every violation
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }
        if let Err(e) = self.pipeline.validate() {
            errors.push(ValidationError::Pipeline(e));
        }
        if let Err(e) = self.prompts.validate() {
            errors.push(ValidationError::Prompts(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            quality_threshold: self.pipeline.quality_threshold,
            refinement_enabled: self.pipeline.refinement_enabled,
            call_timeout: Duration::from_secs(self.pipeline.call_timeout_secs),
            budgets: self.prompts.clone(),
        }
    }

    /// Copy safe to display.
    pub fn redacted(&self) -> Self {
        Self {
            provider: self.provider.redacted(),
            ..self.clone()
        }
    }
}
