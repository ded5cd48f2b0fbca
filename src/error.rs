//! Error types for the study-material generation pipeline.

use thiserror::Error;

/// Failures talking to the remote generative capability.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Provider model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider error: {0}")]
    Other(String),
}

/// Pipeline-level errors surfaced to callers.
///
/// Only `GenerationFailure`, `MalformedArtifact` (on the initial artifact) and
/// `Cancelled` ever leave the orchestrator; the validation and refinement
/// variants are absorbed and reflected in the refinement metadata instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    #[error("Validation unavailable: {0}")]
    ValidationUnavailable(String),

    #[error("Refinement failed: {0}")]
    RefinementFailure(String),

    #[error("Pipeline cancelled during {0}")]
    Cancelled(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    /// Whether the orchestrator propagates this error instead of degrading.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::ValidationUnavailable(_) | PipelineError::RefinementFailure(_)
        )
    }
}

impl From<ProviderError> for PipelineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => PipelineError::ConfigError(msg),
            other => PipelineError::GenerationFailure(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}
