//! Prompt Template Selector
//!
//! Maps a generation request to the instruction text sent to the generative
//! capability. Everything here is a pure function of its inputs.

use crate::types::PageImage;
use serde::{Deserialize, Serialize};

pub mod templates;

pub use templates::generation_prompt;

/// Marker appended to an excerpt that was cut at its character budget.
pub const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// How the generative capability is asked to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Text,
}

/// Instructions for one call to the generative capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub images: Vec<PageImage>,
    pub format: ResponseFormat,
}

impl Prompt {
    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            images: Vec::new(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            images: Vec::new(),
            format: ResponseFormat::Text,
        }
    }

    pub fn with_image(mut self, image: PageImage) -> Self {
        self.images.push(image);
        self
    }
}

/// Character budgets for source excerpts, per use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBudgets {
    #[serde(default = "default_quiz_chars")]
    pub quiz_chars: usize,

    #[serde(default = "default_flashcard_chars")]
    pub flashcard_chars: usize,

    #[serde(default = "default_mastery_chars")]
    pub mastery_chars: usize,

    #[serde(default = "default_validation_chars")]
    pub validation_chars: usize,

    #[serde(default = "default_refinement_chars")]
    pub refinement_chars: usize,

    #[serde(default = "default_evaluation_chars")]
    pub evaluation_chars: usize,

    /// Raw text handed to the transcriber for clean-up
    #[serde(default = "default_extraction_chars")]
    pub extraction_chars: usize,

    /// Language all generated content is written in (unset: follow the source)
    #[serde(default)]
    pub output_language: Option<String>,
}

fn default_quiz_chars() -> usize {
    12_000
}

fn default_flashcard_chars() -> usize {
    12_000
}

fn default_mastery_chars() -> usize {
    3_000
}

fn default_validation_chars() -> usize {
    25_000
}

fn default_refinement_chars() -> usize {
    15_000
}

fn default_evaluation_chars() -> usize {
    2_000
}

fn default_extraction_chars() -> usize {
    25_000
}

impl Default for PromptBudgets {
    fn default() -> Self {
        Self {
            quiz_chars: default_quiz_chars(),
            flashcard_chars: default_flashcard_chars(),
            mastery_chars: default_mastery_chars(),
            validation_chars: default_validation_chars(),
            refinement_chars: default_refinement_chars(),
            evaluation_chars: default_evaluation_chars(),
            extraction_chars: default_extraction_chars(),
            output_language: None,
        }
    }
}

impl PromptBudgets {
    pub fn validate(&self) -> Result<(), String> {
        let budgets = [
            ("quiz_chars", self.quiz_chars),
            ("flashcard_chars", self.flashcard_chars),
            ("mastery_chars", self.mastery_chars),
            ("validation_chars", self.validation_chars),
            ("refinement_chars", self.refinement_chars),
            ("evaluation_chars", self.evaluation_chars),
            ("extraction_chars", self.extraction_chars),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(format!("{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// Extra rule line for the configured output language.
    pub fn language_rule(&self) -> Option<String> {
        self.output_language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(|lang| format!("- Write all generated content in {}.", lang))
    }
}

/// Keep the first `budget` characters of `source`, dropping the tail.
///
/// Cuts on a char boundary and marks the cut so the model knows the
/// excerpt is incomplete.
pub fn excerpt(source: &str, budget: usize) -> String {
    match source.char_indices().nth(budget) {
        Some((byte_index, _)) => {
            let mut cut = source[..byte_index].to_string();
            cut.push_str(TRUNCATION_MARKER);
            cut
        }
        None => source.to_string(),
    }
}
