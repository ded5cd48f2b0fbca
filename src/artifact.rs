//! Typed study-material artifacts.
//!
//! Values of these types are only produced by [`crate::schema::conform`], so a
//! held artifact has already passed its structural contract. Refinement never
//! edits one in place; it produces a whole replacement.

use crate::types::{ArtifactKind, Difficulty};
use serde::{Deserialize, Serialize};

/// Number of answer options every quiz question carries.
pub const QUIZ_OPTION_COUNT: usize = 4;

/// Category label used when a flashcard comes back without one.
pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: [String; QUIZ_OPTION_COUNT],
    pub correct_index: usize,
    pub explanation: String,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSet {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    pub category: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub flashcards: Vec<Flashcard>,
}

/// Transcribed page text, possibly with Markdown structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
}

impl ExtractedText {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// One step of an active-learning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MasteryStep {
    Theory {
        title: String,
        content: String,
        xp: u32,
    },
    Flashcards {
        cards: Vec<Flashcard>,
        xp: u32,
    },
    Quiz {
        questions: Vec<QuizQuestion>,
        xp: u32,
    },
    Practice {
        instruction: String,
        concept: Option<String>,
        xp: u32,
    },
}

impl MasteryStep {
    pub fn xp(&self) -> u32 {
        match self {
            MasteryStep::Theory { xp, .. }
            | MasteryStep::Flashcards { xp, .. }
            | MasteryStep::Quiz { xp, .. }
            | MasteryStep::Practice { xp, .. } => *xp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasteryModule {
    pub title: String,
    pub steps: Vec<MasteryStep>,
}

impl MasteryModule {
    pub fn total_xp(&self) -> u32 {
        self.steps.iter().map(MasteryStep::xp).sum()
    }
}

/// The structured payload flowing through one pipeline run.
///
/// Serializes as the kind-specific JSON body without an enum tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    Quiz(QuizSet),
    Flashcards(FlashcardSet),
    ExtractedText(ExtractedText),
    MasteryModule(MasteryModule),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Quiz(_) => ArtifactKind::Quiz,
            Artifact::Flashcards(_) => ArtifactKind::Flashcards,
            Artifact::ExtractedText(_) => ArtifactKind::ExtractedText,
            Artifact::MasteryModule(_) => ArtifactKind::MasteryModule,
        }
    }

    /// Number of top-level items; 1 for extracted text.
    pub fn item_count(&self) -> usize {
        match self {
            Artifact::Quiz(set) => set.questions.len(),
            Artifact::Flashcards(set) => set.flashcards.len(),
            Artifact::ExtractedText(_) => 1,
            Artifact::MasteryModule(module) => module.steps.len(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn as_quiz(&self) -> Option<&QuizSet> {
        match self {
            Artifact::Quiz(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_flashcards(&self) -> Option<&FlashcardSet> {
        match self {
            Artifact::Flashcards(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_extracted_text(&self) -> Option<&ExtractedText> {
        match self {
            Artifact::ExtractedText(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_mastery_module(&self) -> Option<&MasteryModule> {
        match self {
            Artifact::MasteryModule(module) => Some(module),
            _ => None,
        }
    }
}
