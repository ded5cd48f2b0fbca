//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::PipelineError;

/// Map a command failure to the line printed on stderr.
///
/// Pipeline errors keep their message and gain a hint where the fix is on the
/// caller's side; everything else prints its full context chain.
pub fn map_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::ConfigError(_)) => format!(
            "{:#}\nhint: check studia.toml or run `studia config validate`",
            e
        ),
        Some(PipelineError::Cancelled(_)) => "Cancelled".to_string(),
        _ => format!("{:#}", e),
    }
}
