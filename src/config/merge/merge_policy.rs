//! Merge rules: built-in defaults at the bottom of the stack.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("provider.provider_type", "openai")?
        .set_default("provider.model", "gpt-4o-mini")?
        .set_default("pipeline.quality_threshold", 90)?
        .set_default("pipeline.refinement_enabled", true)?
        .set_default("pipeline.call_timeout_secs", 120)?
        .set_default("pipeline.extraction_concurrency", 4)?
        .set_default("logging.level", "info")
}
