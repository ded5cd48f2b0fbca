//! CLI parse: clap types for studia. No behavior; definitions only.

use crate::types::{Difficulty, Subject};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Studia CLI - self-refining study material generation
#[derive(Parser)]
#[command(name = "studia")]
#[command(about = "Generate quizzes, flashcards and learning sessions from course material")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where studia.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Result format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a multiple-choice quiz from a text file or a page photo
    Quiz {
        #[command(flatten)]
        source: QuizSource,
        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Generate flashcards from a text file
    Flashcards {
        /// Course text file
        #[arg(long)]
        text_file: PathBuf,
        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Transcribe photographed pages (up to 10)
    Extract {
        /// Page image (repeat for several pages)
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,
    },
    /// Design an active learning session from a text file
    Mastery {
        /// Course text file
        #[arg(long)]
        text_file: PathBuf,
        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Grade a student's answer against course context
    Evaluate {
        /// Question or practice instruction
        #[arg(long)]
        instruction: String,
        /// The student's answer
        #[arg(long)]
        answer: String,
        /// Course context file
        #[arg(long)]
        context_file: PathBuf,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct QuizSource {
    /// Course text file
    #[arg(long)]
    pub text_file: Option<PathBuf>,
    /// Photographed course page
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Args, Clone, Copy)]
pub struct GenerationArgs {
    /// Number of items (defaults: quiz 5, flashcards 10, mastery 4 steps)
    #[arg(long)]
    pub count: Option<usize>,
    /// easy, medium or hard
    #[arg(long, default_value = "medium")]
    pub difficulty: Difficulty,
    /// mathematics, sciences, history, languages or programming
    #[arg(long)]
    pub subject: Option<Subject>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration as TOML (API key redacted)
    Show,
    /// Validate the resolved configuration
    Validate,
}
