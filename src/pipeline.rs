//! Pipeline Orchestrator
//!
//! Drives one request through generate, validate, at most one refinement and
//! a single re-validation:
//!
//! ```text
//! GENERATING -> VALIDATING -> DONE
//!                          \-> REFINING -> RE-VALIDATING -> DONE
//! ```
//!
//! Only the generating step can fail the request (plus cancellation at any
//! point). Failures in validation or refinement are absorbed and reported
//! through [`RefinementMetadata::outcome`]. Artifacts and reports are never
//! mutated; a refined artifact replaces the original wholesale.

use crate::artifact::Artifact;
use crate::cancel::{guard, CancellationToken, Interruption};
use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::prompt::PromptBudgets;
use crate::refiner::{ModelRefiner, Refiner};
use crate::schema;
use crate::strategy::strategy_for;
use crate::types::GenerationRequest;
use crate::validator::{ModelValidator, ValidationReport, Validator, DEFAULT_QUALITY_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default deadline for a single remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Generating,
    Validating,
    Refining,
    Revalidating,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Generating => "generating",
            PipelineStage::Validating => "validating",
            PipelineStage::Refining => "refining",
            PipelineStage::Revalidating => "revalidating",
        }
    }

    fn timeout_error(&self, deadline: Duration) -> PipelineError {
        let message = format!("{} timed out after {:?}", self.as_str(), deadline);
        match self {
            PipelineStage::Generating => PipelineError::GenerationFailure(message),
            PipelineStage::Validating | PipelineStage::Revalidating => {
                PipelineError::ValidationUnavailable(message)
            }
            PipelineStage::Refining => PipelineError::RefinementFailure(message),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended with respect to the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementOutcome {
    /// Initial artifact was valid and scored at or above the threshold
    PassedGate,
    /// Refined artifact was re-validated and returned
    Refined,
    /// Refinement failed; original artifact returned
    RefinementFailed,
    /// Initial validation failed; artifact returned unscored
    ValidationUnavailable,
    /// Re-validation failed; refined artifact discarded
    RevalidationUnavailable,
    /// Gate not met but refinement is switched off
    RefinementDisabled,
}

impl RefinementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementOutcome::PassedGate => "passed_gate",
            RefinementOutcome::Refined => "refined",
            RefinementOutcome::RefinementFailed => "refinement_failed",
            RefinementOutcome::ValidationUnavailable => "validation_unavailable",
            RefinementOutcome::RevalidationUnavailable => "revalidation_unavailable",
            RefinementOutcome::RefinementDisabled => "refinement_disabled",
        }
    }
}

impl fmt::Display for RefinementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality record of one run.
///
/// Fields are private so `was_refined == false` always implies
/// `initial_score == final_score`. Deserializing re-checks that and the
/// 0..=100 score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRefinementMetadata")]
pub struct RefinementMetadata {
    was_refined: bool,
    initial_score: u8,
    final_score: u8,
    outcome: RefinementOutcome,
}

impl RefinementMetadata {
    pub fn unrefined(score: u8, outcome: RefinementOutcome) -> Self {
        Self {
            was_refined: false,
            initial_score: score,
            final_score: score,
            outcome,
        }
    }

    pub fn refined(initial_score: u8, final_score: u8) -> Self {
        Self {
            was_refined: true,
            initial_score,
            final_score,
            outcome: RefinementOutcome::Refined,
        }
    }

    pub fn was_refined(&self) -> bool {
        self.was_refined
    }

    pub fn initial_score(&self) -> u8 {
        self.initial_score
    }

    pub fn final_score(&self) -> u8 {
        self.final_score
    }

    pub fn outcome(&self) -> RefinementOutcome {
        self.outcome
    }
}

#[derive(Deserialize)]
struct RawRefinementMetadata {
    was_refined: bool,
    initial_score: u8,
    final_score: u8,
    outcome: RefinementOutcome,
}

impl TryFrom<RawRefinementMetadata> for RefinementMetadata {
    type Error = String;

    fn try_from(raw: RawRefinementMetadata) -> Result<Self, Self::Error> {
        for (name, score) in [("initial_score", raw.initial_score), ("final_score", raw.final_score)] {
            if score > 100 {
                return Err(format!("{} must be between 0 and 100, got {}", name, score));
            }
        }
        if !raw.was_refined && raw.initial_score != raw.final_score {
            return Err(format!(
                "unrefined metadata must keep its score, got {} -> {}",
                raw.initial_score, raw.final_score
            ));
        }
        Ok(Self {
            was_refined: raw.was_refined,
            initial_score: raw.initial_score,
            final_score: raw.final_score,
            outcome: raw.outcome,
        })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub artifact: Artifact,
    pub refinement: RefinementMetadata,
    /// Report behind `final_score`, when one was obtained
    #[serde(skip)]
    pub report: Option<ValidationReport>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub quality_threshold: u8,
    pub refinement_enabled: bool,
    pub call_timeout: Duration,
    pub budgets: PromptBudgets,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            refinement_enabled: true,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            budgets: PromptBudgets::default(),
        }
    }
}

/// Generic orchestrator; kind-specific behaviour comes from [`strategy_for`].
pub struct Pipeline {
    generator: Arc<dyn GenerationClient>,
    validator: Arc<dyn Validator>,
    refiner: Arc<dyn Refiner>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        validator: Arc<dyn Validator>,
        refiner: Arc<dyn Refiner>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            validator,
            refiner,
            settings,
        }
    }

    /// Pipeline whose validator and refiner share the generation client.
    pub fn from_client(client: Arc<dyn GenerationClient>, settings: PipelineSettings) -> Self {
        let validator = Arc::new(ModelValidator::new(
            Arc::clone(&client),
            settings.budgets.clone(),
        ));
        let refiner = Arc::new(ModelRefiner::new(
            Arc::clone(&client),
            settings.budgets.clone(),
        ));
        Self::new(client, validator, refiner, settings)
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn generator(&self) -> Arc<dyn GenerationClient> {
        Arc::clone(&self.generator)
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<PipelineOutput, PipelineError> {
        self.run_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        request: &GenerationRequest,
        token: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let started = Instant::now();
        let strategy = strategy_for(request.kind);
        info!(
            kind = %request.kind,
            source_len = request.source.len_hint(),
            count = ?request.count,
            difficulty = %request.difficulty,
            "Pipeline started"
        );

        // GENERATING
        debug!(stage = %PipelineStage::Generating, "Stage entered");
        let prompt = strategy.prompt(request, &self.settings.budgets);
        let value = self
            .call(PipelineStage::Generating, token, self.generator.generate(&prompt))
            .await?;
        let artifact = strategy.conform(value, request)?;

        if let Some(mismatch) = schema::count_mismatch(&artifact, strategy.expected_count(request)) {
            warn!(
                kind = %request.kind,
                expected = mismatch.expected,
                actual = mismatch.actual,
                "Generated item count differs from the requested count"
            );
        }

        let output = self.review(request, artifact, token).await?;
        info!(
            kind = %request.kind,
            items = output.artifact.item_count(),
            outcome = %output.refinement.outcome(),
            was_refined = output.refinement.was_refined(),
            initial_score = output.refinement.initial_score(),
            final_score = output.refinement.final_score(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline finished"
        );
        Ok(output)
    }

    /// VALIDATING and, when the gate is missed, REFINING and RE-VALIDATING.
    async fn review(
        &self,
        request: &GenerationRequest,
        artifact: Artifact,
        token: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        debug!(stage = %PipelineStage::Validating, "Stage entered");
        let initial = match self
            .call(
                PipelineStage::Validating,
                token,
                self.validator.validate(&request.source, &artifact),
            )
            .await
        {
            Ok(report) => report,
            Err(e @ PipelineError::Cancelled(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Validation unavailable, returning artifact unscored");
                return Ok(done(
                    artifact,
                    RefinementMetadata::unrefined(0, RefinementOutcome::ValidationUnavailable),
                    None,
                ));
            }
        };

        info!(
            score = initial.score,
            is_valid = initial.is_valid,
            issues = initial.issues.len(),
            threshold = self.settings.quality_threshold,
            "Initial validation"
        );

        if initial.passes_gate(self.settings.quality_threshold) {
            let metadata = RefinementMetadata::unrefined(initial.score, RefinementOutcome::PassedGate);
            return Ok(done(artifact, metadata, Some(initial)));
        }
        if !self.settings.refinement_enabled {
            let metadata =
                RefinementMetadata::unrefined(initial.score, RefinementOutcome::RefinementDisabled);
            return Ok(done(artifact, metadata, Some(initial)));
        }

        debug!(stage = %PipelineStage::Refining, "Stage entered");
        let refined = self
            .call(
                PipelineStage::Refining,
                token,
                self.refiner.refine(request, &artifact, &initial),
            )
            .await
            .and_then(|refined| {
                strategy_for(request.kind)
                    .check(&refined)
                    .map(|_| refined)
                    .map_err(|e| PipelineError::RefinementFailure(e.to_string()))
            });
        let refined = match refined {
            Ok(refined) => refined,
            Err(e @ PipelineError::Cancelled(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Refinement failed, keeping original artifact");
                let metadata =
                    RefinementMetadata::unrefined(initial.score, RefinementOutcome::RefinementFailed);
                return Ok(done(artifact, metadata, Some(initial)));
            }
        };

        debug!(stage = %PipelineStage::Revalidating, "Stage entered");
        match self
            .call(
                PipelineStage::Revalidating,
                token,
                self.validator.validate(&request.source, &refined),
            )
            .await
        {
            Ok(report) => {
                info!(
                    initial_score = initial.score,
                    final_score = report.score,
                    is_valid = report.is_valid,
                    "Refined artifact re-validated"
                );
                let metadata = RefinementMetadata::refined(initial.score, report.score);
                Ok(done(refined, metadata, Some(report)))
            }
            Err(e @ PipelineError::Cancelled(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Re-validation unavailable, discarding refined artifact");
                let metadata = RefinementMetadata::unrefined(
                    initial.score,
                    RefinementOutcome::RevalidationUnavailable,
                );
                Ok(done(artifact, metadata, Some(initial)))
            }
        }
    }

    async fn call<T, F>(
        &self,
        stage: PipelineStage,
        token: &CancellationToken,
        call: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        match guard(token, self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(Interruption::Cancelled) => {
                info!(stage = %stage, "Pipeline cancelled");
                Err(PipelineError::Cancelled(stage.to_string()))
            }
            Err(Interruption::TimedOut(deadline)) => Err(stage.timeout_error(deadline)),
        }
    }
}

fn done(
    artifact: Artifact,
    refinement: RefinementMetadata,
    report: Option<ValidationReport>,
) -> PipelineOutput {
    PipelineOutput {
        artifact,
        refinement,
        report,
    }
}
