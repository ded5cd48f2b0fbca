//! Validator
//!
//! Scores a produced artifact against the source it was generated from. The
//! judging itself is a generation call: the artifact and a source excerpt are
//! handed to the generative capability with a judge-style instruction, and the
//! answer is normalised into a [`ValidationReport`].

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::prompt::templates::{attach_source, course_block, JSON_ONLY_SYSTEM};
use crate::prompt::{Prompt, PromptBudgets};
use crate::schema;
use crate::types::{ArtifactKind, SourceMaterial};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Score an artifact must reach, together with `is_valid`, to skip refinement.
pub const DEFAULT_QUALITY_THRESHOLD: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Lenient parse of a judge-supplied label; unknown labels count as medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" | "major" => Severity::High,
            "low" | "minor" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub location: String,
    pub severity: Severity,
    pub description: String,
    pub suggestion: String,
}

/// Outcome of one validator call. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub score: u8,
    pub issues: Vec<ValidationIssue>,
    pub summary: String,
}

impl ValidationReport {
    /// Build a report, enforcing the validity policy.
    ///
    /// The score is clamped to 0..=100 and a report with any high-severity
    /// issue is invalid whatever the judge claimed.
    pub fn new(
        judged_valid: bool,
        score: i64,
        issues: Vec<ValidationIssue>,
        summary: impl Into<String>,
    ) -> Self {
        let has_high = issues.iter().any(|i| i.severity == Severity::High);
        Self {
            is_valid: judged_valid && !has_high,
            score: score.clamp(0, 100) as u8,
            issues,
            summary: summary.into(),
        }
    }

    /// Quality gate: valid and at or above `threshold`.
    pub fn passes_gate(&self, threshold: u8) -> bool {
        self.is_valid && self.score >= threshold
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Judge an artifact against its source material.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        source: &SourceMaterial,
        artifact: &Artifact,
    ) -> Result<ValidationReport, PipelineError>;
}

/// [`Validator`] that asks the generative capability to act as judge.
pub struct ModelValidator {
    client: Arc<dyn GenerationClient>,
    budgets: PromptBudgets,
}

impl ModelValidator {
    pub fn new(client: Arc<dyn GenerationClient>, budgets: PromptBudgets) -> Self {
        Self { client, budgets }
    }
}

#[async_trait]
impl Validator for ModelValidator {
    async fn validate(
        &self,
        source: &SourceMaterial,
        artifact: &Artifact,
    ) -> Result<ValidationReport, PipelineError> {
        if let Err(e) = schema::check(artifact) {
            return Ok(structural_failure(&e));
        }

        let prompt = validation_prompt(source, artifact, &self.budgets);
        let value = self
            .client
            .generate(&prompt)
            .await
            .map_err(|e| PipelineError::ValidationUnavailable(e.to_string()))?;

        let report = parse_report(value)?;
        debug!(
            kind = %artifact.kind(),
            score = report.score,
            is_valid = report.is_valid,
            issues = report.issues.len(),
            "Validation report parsed"
        );
        Ok(report)
    }
}

fn structural_failure(error: &PipelineError) -> ValidationReport {
    ValidationReport::new(
        false,
        0,
        vec![ValidationIssue {
            location: "structure".to_string(),
            severity: Severity::High,
            description: error.to_string(),
            suggestion: "Regenerate the artifact with the required fields".to_string(),
        }],
        "Artifact violates its structural contract",
    )
}

fn judged_items(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Quiz => "question, its four options, the correct answer and the explanation",
        ArtifactKind::Flashcards => "flashcard (front, back, category and difficulty)",
        ArtifactKind::ExtractedText => "line of the transcription",
        ArtifactKind::MasteryModule => "step, card and question of the session",
    }
}

/// Judge instruction for an artifact.
pub fn validation_prompt(
    source: &SourceMaterial,
    artifact: &Artifact,
    budgets: &PromptBudgets,
) -> Prompt {
    let kind = artifact.kind();
    let artifact_json =
        serde_json::to_string_pretty(&artifact.to_json()).unwrap_or_else(|_| "{}".to_string());

    let fidelity_rule = if kind == ArtifactKind::ExtractedText {
        "\n- For a transcription, flag any word, number or formula that differs from the page, \
         and any added commentary."
    } else {
        ""
    };

    let user = format!(
        "You are a strict reviewer of study material.\n\
         Compare every {items} below against the COURSE and nothing else.\n\n\
         COURSE:\n{course}\n\n\
         MATERIAL ({kind}):\n{artifact}\n\n\
         Flag, as issues:\n\
         - (a) content that is not grounded in the course\n\
         - (b) incorrect answers or explanations\n\
         - (c) duplicate or redundant items\n\
         - (d) items whose difficulty does not match their label or the rest of the set{fidelity}\n\n\
         Severity: \"high\" for wrong or ungrounded content, \"medium\" for duplicates and \
         difficulty mismatches, \"low\" for wording.\n\
         The score is the percentage of items that are fully correct and grounded (0-100).\n\
         is_valid is false if any issue is \"high\".\n\n\
         Return JSON in this format:\n\
         {{\n  \"is_valid\": true,\n  \"score\": 95,\n  \"issues\": [\n    {{ \"location\": \"Question 2\", \
         \"severity\": \"high\", \"description\": \"...\", \"suggestion\": \"...\" }}\n  ],\n  \
         \"summary\": \"One sentence\"\n}}\n",
        items = judged_items(kind),
        course = course_block(source, budgets.validation_chars),
        kind = kind,
        artifact = artifact_json,
        fidelity = fidelity_rule,
    );
    attach_source(Prompt::json(JSON_ONLY_SYSTEM, user), source)
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(default = "default_true")]
    is_valid: bool,
    score: Option<Value>,
    #[serde(default)]
    issues: Vec<RawIssue>,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct RawIssue {
    #[serde(default)]
    location: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: String,
}

fn default_true() -> bool {
    true
}

/// Read a judge score given as a number, a numeric string or a percentage.
pub(crate) fn score_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Normalise a judge answer into a report.
pub fn parse_report(value: Value) -> Result<ValidationReport, PipelineError> {
    let raw: RawReport = serde_json::from_value(value)
        .map_err(|e| PipelineError::ValidationUnavailable(format!("Unreadable report: {}", e)))?;
    let score = raw
        .score
        .as_ref()
        .and_then(score_from)
        .ok_or_else(|| PipelineError::ValidationUnavailable("Report has no score".to_string()))?;

    let issues = raw
        .issues
        .into_iter()
        .filter(|i| !i.description.trim().is_empty())
        .map(|i| ValidationIssue {
            location: i.location,
            severity: Severity::from_label(&i.severity),
            description: i.description,
            suggestion: i.suggestion,
        })
        .collect();

    Ok(ValidationReport::new(raw.is_valid, score, issues, raw.summary))
}
