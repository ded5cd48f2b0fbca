//! Refiner
//!
//! Repairs the issues a validator flagged by asking for a whole replacement
//! artifact of the same kind and size. The answer goes through the same schema
//! contract as the initial generation.

use crate::artifact::Artifact;
use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::prompt::templates::{attach_source, course_block, JSON_ONLY_SYSTEM};
use crate::prompt::{Prompt, PromptBudgets};
use crate::strategy::strategy_for;
use crate::types::{ArtifactKind, GenerationRequest};
use crate::validator::ValidationReport;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Produce a corrected replacement for a flagged artifact.
///
/// The source material is carried by `request`; its difficulty fills any
/// defaulted field in the replacement.
#[async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(
        &self,
        request: &GenerationRequest,
        artifact: &Artifact,
        report: &ValidationReport,
    ) -> Result<Artifact, PipelineError>;
}

/// [`Refiner`] backed by the generative capability.
pub struct ModelRefiner {
    client: Arc<dyn GenerationClient>,
    budgets: PromptBudgets,
}

impl ModelRefiner {
    pub fn new(client: Arc<dyn GenerationClient>, budgets: PromptBudgets) -> Self {
        Self { client, budgets }
    }
}

#[async_trait]
impl Refiner for ModelRefiner {
    async fn refine(
        &self,
        request: &GenerationRequest,
        artifact: &Artifact,
        report: &ValidationReport,
    ) -> Result<Artifact, PipelineError> {
        let prompt = refinement_prompt(request, artifact, report, &self.budgets);
        let value = self
            .client
            .generate(&prompt)
            .await
            .map_err(|e| PipelineError::RefinementFailure(e.to_string()))?;

        let refined = strategy_for(artifact.kind())
            .conform(value, request)
            .map_err(|e| PipelineError::RefinementFailure(e.to_string()))?;

        debug!(
            kind = %refined.kind(),
            before = artifact.item_count(),
            after = refined.item_count(),
            "Refined artifact conformed"
        );
        Ok(refined)
    }
}

fn issue_list(report: &ValidationReport) -> String {
    if report.issues.is_empty() {
        return format!(
            "- (no itemised issue) The reviewer scored the material {}/100: {}",
            report.score, report.summary
        );
    }
    report
        .issues
        .iter()
        .enumerate()
        .map(|(index, issue)| {
            let mut line = format!(
                "{}. [{:?}] {}: {}",
                index + 1,
                issue.severity,
                issue.location,
                issue.description
            );
            if !issue.suggestion.trim().is_empty() {
                line.push_str(&format!(" (suggestion: {})", issue.suggestion));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Repair instruction for a flagged artifact.
pub fn refinement_prompt(
    request: &GenerationRequest,
    artifact: &Artifact,
    report: &ValidationReport,
    budgets: &PromptBudgets,
) -> Prompt {
    let kind = artifact.kind();
    let artifact_json =
        serde_json::to_string_pretty(&artifact.to_json()).unwrap_or_else(|_| "{}".to_string());

    let count_rule = match kind {
        ArtifactKind::ExtractedText => {
            "- Keep the whole transcription; only fix what differs from the page".to_string()
        }
        _ => format!(
            "- Return EXACTLY {} items under \"{}\", the same number as the input",
            artifact.item_count(),
            strategy_for(kind).root_key()
        ),
    };

    let mut rules = vec![
        count_rule,
        "- Fix EVERY issue listed above".to_string(),
        "- Keep items that have no issue unchanged".to_string(),
        "- Do NOT introduce any content that is not in the course".to_string(),
        "- Keep exactly the same JSON structure as the input".to_string(),
    ];
    if let Some(language) = budgets.language_rule() {
        rules.push(language);
    }
    rules.push("- No text before or after the JSON".to_string());

    let output_shape = if kind == ArtifactKind::ExtractedText {
        "{ \"text\": \"corrected transcription\" }".to_string()
    } else {
        "the same shape as the MATERIAL above".to_string()
    };

    let user = format!(
        "Correct this study material ({kind}) using ONLY the course.\n\n\
         COURSE:\n{course}\n\n\
         MATERIAL:\n{artifact}\n\n\
         ISSUES FOUND BY THE REVIEWER (score {score}/100):\n{issues}\n\n\
         Return the complete corrected material as JSON with {shape}.\n\n\
         RULES:\n{rules}\n",
        kind = kind,
        course = course_block(&request.source, budgets.refinement_chars),
        artifact = artifact_json,
        score = report.score,
        issues = issue_list(report),
        shape = output_shape,
        rules = rules.join("\n"),
    );
    attach_source(Prompt::json(JSON_ONLY_SYSTEM, user), &request.source)
}
