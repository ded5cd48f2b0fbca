//! Shared doubles for pipeline and service tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use studia::artifact::Artifact;
use studia::error::PipelineError;
use studia::generation::GenerationClient;
use studia::pipeline::{Pipeline, PipelineSettings};
use studia::prompt::{Prompt, ResponseFormat};
use studia::refiner::Refiner;
use studia::types::{GenerationRequest, SourceMaterial};
use studia::validator::{ValidationReport, Validator};

pub const COURSE: &str = "Photosynthesis converts light energy into chemical energy. \
    Chlorophyll absorbs mostly blue and red light. The Calvin cycle fixes carbon dioxide \
    into sugars inside the stroma of the chloroplast.";

/// Answers calls in order from a fixed script and records every prompt.
#[derive(Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<Value, PipelineError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<Value, PipelineError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompt(&self, index: usize) -> Prompt {
        self.prompts.lock()[index].clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, prompt: &Prompt) -> Result<Value, PipelineError> {
        self.prompts.lock().push(prompt.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::GenerationFailure("script exhausted".to_string())))
    }
}

/// Answers by inspecting each prompt; safe under concurrent calls.
pub struct RoutedClient<F> {
    route: F,
    calls: Mutex<usize>,
}

impl<F> RoutedClient<F>
where
    F: Fn(&Prompt) -> Result<Value, PipelineError> + Send + Sync,
{
    pub fn new(route: F) -> Arc<Self> {
        Arc::new(Self {
            route,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl<F> GenerationClient for RoutedClient<F>
where
    F: Fn(&Prompt) -> Result<Value, PipelineError> + Send + Sync,
{
    async fn generate(&self, prompt: &Prompt) -> Result<Value, PipelineError> {
        *self.calls.lock() += 1;
        (self.route)(prompt)
    }
}

/// Never answers.
pub struct SilentClient;

#[async_trait]
impl GenerationClient for SilentClient {
    async fn generate(&self, _prompt: &Prompt) -> Result<Value, PipelineError> {
        std::future::pending::<()>().await;
        Err(PipelineError::GenerationFailure("unreachable".to_string()))
    }
}

/// Validator returning scripted reports, counting calls.
#[derive(Default)]
pub struct FakeValidator {
    reports: Mutex<VecDeque<Result<ValidationReport, PipelineError>>>,
    seen: Mutex<Vec<Artifact>>,
}

impl FakeValidator {
    pub fn new(reports: Vec<Result<ValidationReport, PipelineError>>) -> Arc<Self> {
        Arc::new(Self {
            reports: Mutex::new(reports.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Validator for FakeValidator {
    async fn validate(
        &self,
        _source: &SourceMaterial,
        artifact: &Artifact,
    ) -> Result<ValidationReport, PipelineError> {
        self.seen.lock().push(artifact.clone());
        self.reports
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::ValidationUnavailable("no report".to_string())))
    }
}

/// Refiner returning a fixed replacement.
pub struct FakeRefiner {
    replacement: Mutex<Option<Result<Artifact, PipelineError>>>,
    calls: Mutex<usize>,
}

impl FakeRefiner {
    pub fn new(replacement: Result<Artifact, PipelineError>) -> Arc<Self> {
        Arc::new(Self {
            replacement: Mutex::new(Some(replacement)),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Refiner for FakeRefiner {
    async fn refine(
        &self,
        _request: &GenerationRequest,
        _artifact: &Artifact,
        _report: &ValidationReport,
    ) -> Result<Artifact, PipelineError> {
        *self.calls.lock() += 1;
        self.replacement
            .lock()
            .take()
            .unwrap_or_else(|| Err(PipelineError::RefinementFailure("already used".to_string())))
    }
}

pub fn scripted_pipeline(client: Arc<ScriptedClient>, settings: PipelineSettings) -> Pipeline {
    Pipeline::from_client(client, settings)
}

pub fn question(index: usize, correct_index: i64) -> Value {
    json!({
        "question": format!("Question {} about photosynthesis?", index),
        "options": ["Light", "Water", "Soil", "Wind"],
        "correct_index": correct_index,
        "explanation": "Light energy drives photosynthesis."
    })
}

pub fn quiz_json(count: usize) -> Value {
    json!({ "questions": (1..=count).map(|i| question(i, 0)).collect::<Vec<_>>() })
}

pub fn flashcards_json(count: usize, prefix: &str) -> Value {
    let cards: Vec<Value> = (1..=count)
        .map(|i| {
            json!({
                "front": format!("{} term {}", prefix, i),
                "back": format!("{} definition {}", prefix, i),
                "category": "Biology",
                "difficulty": "medium"
            })
        })
        .collect();
    json!({ "flashcards": cards })
}

pub fn report_json(score: i64, is_valid: bool) -> Value {
    let issues = if is_valid {
        Vec::new()
    } else {
        vec![json!({
            "location": "Item 2",
            "severity": "high",
            "description": "Not supported by the course",
            "suggestion": "Use the Calvin cycle paragraph"
        })]
    };
    json!({
        "is_valid": is_valid,
        "score": score,
        "issues": issues,
        "summary": "Reviewed"
    })
}

pub fn report(score: i64, is_valid: bool) -> ValidationReport {
    ValidationReport::new(is_valid, score, Vec::new(), "Reviewed")
}

pub fn is_validation_prompt(prompt: &Prompt) -> bool {
    prompt.format == ResponseFormat::Json && prompt.user.contains("strict reviewer")
}
