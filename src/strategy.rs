//! Artifact-kind strategies.
//!
//! The orchestrator is generic; everything that differs between quizzes,
//! flashcards, transcriptions and mastery sessions lives behind
//! [`ArtifactStrategy`]: which template builds the prompt, which root key the
//! JSON collection sits under and how many items are expected.

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::prompt::templates::{extraction_prompt, flashcard_prompt, mastery_prompt, quiz_prompt};
use crate::prompt::{Prompt, PromptBudgets};
use crate::schema::{self, KEY_FLASHCARDS, KEY_QUESTIONS, KEY_STEPS, KEY_TEXT};
use crate::types::{ArtifactKind, GenerationRequest};
use serde_json::Value;

pub trait ArtifactStrategy: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    /// JSON key the artifact's items are returned under.
    fn root_key(&self) -> &'static str;

    fn prompt(&self, request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt;

    /// Item count the artifact should have; `None` when counts do not apply.
    fn expected_count(&self, request: &GenerationRequest) -> Option<usize> {
        request.expected_count()
    }

    fn conform(&self, value: Value, request: &GenerationRequest) -> Result<Artifact, PipelineError> {
        schema::conform(self.kind(), value, request)
    }

    fn check(&self, artifact: &Artifact) -> Result<(), PipelineError> {
        if artifact.kind() != self.kind() {
            return Err(PipelineError::MalformedArtifact(format!(
                "Expected a {} artifact, got {}",
                self.kind(),
                artifact.kind()
            )));
        }
        schema::check(artifact)
    }
}

pub struct QuizStrategy;

impl ArtifactStrategy for QuizStrategy {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Quiz
    }

    fn root_key(&self) -> &'static str {
        KEY_QUESTIONS
    }

    fn prompt(&self, request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
        quiz_prompt(request, budgets)
    }
}

pub struct FlashcardStrategy;

impl ArtifactStrategy for FlashcardStrategy {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Flashcards
    }

    fn root_key(&self) -> &'static str {
        KEY_FLASHCARDS
    }

    fn prompt(&self, request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
        flashcard_prompt(request, budgets)
    }
}

pub struct ExtractionStrategy;

impl ArtifactStrategy for ExtractionStrategy {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::ExtractedText
    }

    fn root_key(&self) -> &'static str {
        KEY_TEXT
    }

    fn prompt(&self, request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
        extraction_prompt(request, budgets)
    }

    fn expected_count(&self, _request: &GenerationRequest) -> Option<usize> {
        None
    }
}

pub struct MasteryStrategy;

impl ArtifactStrategy for MasteryStrategy {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::MasteryModule
    }

    fn root_key(&self) -> &'static str {
        KEY_STEPS
    }

    fn prompt(&self, request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
        mastery_prompt(request, budgets)
    }
}

static QUIZ: QuizStrategy = QuizStrategy;
static FLASHCARDS: FlashcardStrategy = FlashcardStrategy;
static EXTRACTION: ExtractionStrategy = ExtractionStrategy;
static MASTERY: MasteryStrategy = MasteryStrategy;

/// Strategy for an artifact kind.
pub fn strategy_for(kind: ArtifactKind) -> &'static dyn ArtifactStrategy {
    match kind {
        ArtifactKind::Quiz => &QUIZ,
        ArtifactKind::Flashcards => &FLASHCARDS,
        ArtifactKind::ExtractedText => &EXTRACTION,
        ArtifactKind::MasteryModule => &MASTERY,
    }
}
