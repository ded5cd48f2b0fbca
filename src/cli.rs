//! CLI domain: parse, route, output, and presentation only.
//! No pipeline orchestration; the route table dispatches to the study service.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands, GenerationArgs, OutputFormat, QuizSource};
pub use presentation::{
    format_artifact_text, format_document_text, format_evaluation_text, format_json,
    format_record_text, format_refinement, format_score,
};
pub use route::{read_page_image, RunContext};
