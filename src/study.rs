//! Study-material facade
//!
//! Request-level entry points over the pipeline: quizzes from text or a page
//! photo, flashcards, mastery sessions, multi-page extraction and answer
//! evaluation. Enforces the request limits and wraps each result in a
//! [`StudyRecord`] ready to be persisted by the caller.

use crate::artifact::Artifact;
use crate::cancel::{guard, CancellationToken, Interruption};
use crate::error::PipelineError;
use crate::evaluation::{AnswerEvaluation, AnswerEvaluator};
use crate::generation::GenerationClient;
use crate::pipeline::{Pipeline, PipelineOutput, PipelineSettings, RefinementMetadata};
use crate::types::{
    ArtifactKind, Difficulty, GenerationRequest, PageImage, SourceMaterial, Subject,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Most pages accepted by one extraction call.
pub const MAX_PAGES: usize = 10;

/// Largest decoded page image accepted.
pub const MAX_PAGE_BYTES: usize = 10 * 1024 * 1024;

/// Shortest course text (trimmed) worth generating from.
pub const MIN_SOURCE_CHARS: usize = 10;

/// Below this many characters a page counts as blank.
pub const MIN_PAGE_TEXT_CHARS: usize = 5;

pub const DEFAULT_EXTRACTION_CONCURRENCY: usize = 4;

/// Caller-facing generation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StudyOptions {
    pub count: Option<usize>,
    pub difficulty: Difficulty,
    pub subject: Option<Subject>,
}

/// A generated artifact with its provenance and quality record.
#[derive(Debug, Clone, Serialize)]
pub struct StudyRecord {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub artifact: Artifact,
    pub refinement: RefinementMetadata,
}

impl StudyRecord {
    fn new(request: &GenerationRequest, output: PipelineOutput, extracted_text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: request.kind,
            difficulty: request.difficulty,
            created_at: Utc::now(),
            extracted_text,
            artifact: output.artifact,
            refinement: output.refinement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedPage {
    pub page_number: usize,
    pub text: String,
    pub word_count: usize,
    pub refinement: RefinementMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    pub pages: Vec<ExtractedPage>,
    pub combined_text: String,
}

impl ExtractedDocument {
    fn from_pages(pages: Vec<ExtractedPage>) -> Self {
        let combined_text = pages
            .iter()
            .map(|page| format!("\n--- PAGE {} ---\n{}\n", page.page_number, page.text))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            pages,
            combined_text,
        }
    }

    pub fn total_words(&self) -> usize {
        self.pages.iter().map(|page| page.word_count).sum()
    }
}

pub struct StudyService {
    pipeline: Arc<Pipeline>,
    evaluator: AnswerEvaluator,
    extraction_concurrency: usize,
}

impl StudyService {
    pub fn new(pipeline: Pipeline, evaluator: AnswerEvaluator, extraction_concurrency: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            evaluator,
            extraction_concurrency: extraction_concurrency.max(1),
        }
    }

    /// Service whose every component talks through `client`.
    pub fn from_client(
        client: Arc<dyn GenerationClient>,
        settings: PipelineSettings,
        extraction_concurrency: usize,
    ) -> Self {
        let evaluator = AnswerEvaluator::new(Arc::clone(&client), settings.budgets.clone());
        Self::new(
            Pipeline::from_client(client, settings),
            evaluator,
            extraction_concurrency,
        )
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn quiz_from_text(
        &self,
        text: &str,
        options: StudyOptions,
        token: &CancellationToken,
    ) -> Result<StudyRecord, PipelineError> {
        self.from_text(ArtifactKind::Quiz, text, options, token).await
    }

    pub async fn flashcards(
        &self,
        text: &str,
        options: StudyOptions,
        token: &CancellationToken,
    ) -> Result<StudyRecord, PipelineError> {
        self.from_text(ArtifactKind::Flashcards, text, options, token).await
    }

    pub async fn mastery_module(
        &self,
        text: &str,
        options: StudyOptions,
        token: &CancellationToken,
    ) -> Result<StudyRecord, PipelineError> {
        self.from_text(ArtifactKind::MasteryModule, text, options, token).await
    }

    /// Transcribe one page, then build a quiz from the transcription.
    pub async fn quiz_from_image(
        &self,
        image: PageImage,
        options: StudyOptions,
        token: &CancellationToken,
    ) -> Result<StudyRecord, PipelineError> {
        check_page_size(&image, 1)?;
        let extraction = self.extract_page(image, token).await?;
        let text = extracted_text(&extraction.artifact)?;
        if text.trim().chars().count() < MIN_SOURCE_CHARS {
            return Err(PipelineError::InvalidRequest(
                "Not enough text could be extracted from the image".to_string(),
            ));
        }

        let request = build_request(ArtifactKind::Quiz, SourceMaterial::text(text.clone()), options)?;
        let output = self.pipeline.run_with_cancel(&request, token).await?;
        Ok(StudyRecord::new(&request, output, Some(text)))
    }

    /// Transcribe up to [`MAX_PAGES`] pages, concurrently but in page order.
    pub async fn extract_pages(
        &self,
        images: Vec<PageImage>,
        token: &CancellationToken,
    ) -> Result<ExtractedDocument, PipelineError> {
        if images.is_empty() {
            return Err(PipelineError::InvalidRequest("No image provided".to_string()));
        }
        if images.len() > MAX_PAGES {
            return Err(PipelineError::InvalidRequest(format!(
                "At most {} images are allowed, got {}",
                MAX_PAGES,
                images.len()
            )));
        }
        for (index, image) in images.iter().enumerate() {
            check_page_size(image, index + 1)?;
        }

        info!(pages = images.len(), concurrency = self.extraction_concurrency, "Extracting pages");
        let pages: Vec<ExtractedPage> = stream::iter(images.into_iter().enumerate())
            .map(|(index, image)| async move {
                let page_number = index + 1;
                let output = self.extract_page(image, token).await?;
                let mut text = extracted_text(&output.artifact)?;
                if text.trim().chars().count() < MIN_PAGE_TEXT_CHARS {
                    warn!(page = page_number, "Page has little or no text");
                    text = format!("[Page {} - no text detected]", page_number);
                }
                let word_count = text.split_whitespace().count();
                Ok::<_, PipelineError>(ExtractedPage {
                    page_number,
                    text,
                    word_count,
                    refinement: output.refinement,
                })
            })
            .buffered(self.extraction_concurrency)
            .try_collect()
            .await?;

        let document = ExtractedDocument::from_pages(pages);
        info!(
            pages = document.pages.len(),
            words = document.total_words(),
            "Pages extracted"
        );
        Ok(document)
    }

    pub async fn evaluate_answer(
        &self,
        instruction: &str,
        answer: &str,
        context: &str,
        token: &CancellationToken,
    ) -> Result<AnswerEvaluation, PipelineError> {
        let deadline = self.pipeline.settings().call_timeout;
        match guard(token, deadline, self.evaluator.evaluate(instruction, answer, context)).await {
            Ok(result) => result,
            Err(Interruption::Cancelled) => Err(PipelineError::Cancelled("evaluating".to_string())),
            Err(Interruption::TimedOut(d)) => Err(PipelineError::GenerationFailure(format!(
                "evaluating timed out after {:?}",
                d
            ))),
        }
    }

    async fn from_text(
        &self,
        kind: ArtifactKind,
        text: &str,
        options: StudyOptions,
        token: &CancellationToken,
    ) -> Result<StudyRecord, PipelineError> {
        if text.trim().chars().count() < MIN_SOURCE_CHARS {
            return Err(PipelineError::InvalidRequest(
                "Course text is too short or empty".to_string(),
            ));
        }
        let request = build_request(kind, SourceMaterial::text(text), options)?;
        let output = self.pipeline.run_with_cancel(&request, token).await?;
        Ok(StudyRecord::new(&request, output, None))
    }

    async fn extract_page(
        &self,
        image: PageImage,
        token: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let request = GenerationRequest::new(ArtifactKind::ExtractedText, SourceMaterial::Page(image));
        self.pipeline.run_with_cancel(&request, token).await
    }
}

fn build_request(
    kind: ArtifactKind,
    source: SourceMaterial,
    options: StudyOptions,
) -> Result<GenerationRequest, PipelineError> {
    let mut request = GenerationRequest::new(kind, source)
        .with_difficulty(options.difficulty)
        .with_subject(options.subject);
    if let Some(count) = options.count {
        if count == 0 {
            return Err(PipelineError::InvalidRequest(
                "Requested count must be at least 1".to_string(),
            ));
        }
        request = request.with_count(count);
    }
    Ok(request)
}

fn check_page_size(image: &PageImage, page_number: usize) -> Result<(), PipelineError> {
    if image.data_base64.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(format!(
            "Image {} is empty",
            page_number
        )));
    }
    if image.approx_size_bytes() > MAX_PAGE_BYTES {
        return Err(PipelineError::InvalidRequest(format!(
            "Image {} is too large (max 10MB)",
            page_number
        )));
    }
    Ok(())
}

fn extracted_text(artifact: &Artifact) -> Result<String, PipelineError> {
    artifact
        .as_extracted_text()
        .map(|extracted| extracted.text.clone())
        .ok_or_else(|| {
            PipelineError::MalformedArtifact(format!(
                "Expected extracted text, got {}",
                artifact.kind()
            ))
        })
}
