//! End-to-end runs of the generate, validate and refine pipeline.

use super::support::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use studia::artifact::Artifact;
use studia::cancel::CancellationToken;
use studia::error::PipelineError;
use studia::pipeline::{Pipeline, PipelineSettings, RefinementOutcome};
use studia::types::{ArtifactKind, GenerationRequest, SourceMaterial};

fn quiz_request() -> GenerationRequest {
    GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text(COURSE))
}

fn flashcard_request() -> GenerationRequest {
    GenerationRequest::new(ArtifactKind::Flashcards, SourceMaterial::text(COURSE))
}

#[tokio::test]
async fn high_scoring_quiz_passes_the_gate_untouched() {
    let client = ScriptedClient::new(vec![Ok(quiz_json(5)), Ok(report_json(95, true))]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert_eq!(output.artifact.item_count(), 5);
    assert!(!output.refinement.was_refined());
    assert_eq!(output.refinement.initial_score(), 95);
    assert_eq!(output.refinement.final_score(), 95);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::PassedGate);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn low_scoring_flashcards_are_refined_and_rescored() {
    let client = ScriptedClient::new(vec![
        Ok(flashcards_json(10, "Draft")),
        Ok(report_json(40, false)),
        Ok(flashcards_json(10, "Refined")),
        Ok(report_json(92, true)),
    ]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&flashcard_request()).await.unwrap();

    assert!(output.refinement.was_refined());
    assert_eq!(output.refinement.initial_score(), 40);
    assert_eq!(output.refinement.final_score(), 92);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::Refined);
    let cards = output.artifact.as_flashcards().unwrap();
    assert_eq!(cards.flashcards.len(), 10);
    assert_eq!(cards.flashcards[0].front, "Refined term 1");
    assert_eq!(output.report.unwrap().score, 92);
    assert_eq!(client.calls(), 4);

    // Refinement prompt carries the flagged issue and the item count
    let refine_prompt = client.prompt(2);
    assert!(refine_prompt.user.contains("Not supported by the course"));
    assert!(refine_prompt.user.contains("10"));
}

#[tokio::test]
async fn out_of_range_answer_index_fails_before_validation() {
    let body = json!({ "questions": [question(1, 0), question(2, 4)] });
    let client = ScriptedClient::new(vec![Ok(body), Ok(report_json(100, true))]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let err = pipeline.run(&quiz_request()).await.unwrap_err();

    assert!(matches!(err, PipelineError::MalformedArtifact(_)));
    assert!(err.to_string().contains("Question 2"));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn generation_failure_is_propagated() {
    let client = ScriptedClient::new(vec![Err(PipelineError::GenerationFailure(
        "HTTP 500".to_string(),
    ))]);
    let pipeline = scripted_pipeline(client, PipelineSettings::default());

    let err = pipeline.run(&quiz_request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::GenerationFailure(_)));
}

#[tokio::test]
async fn refiner_failure_returns_the_original_artifact() {
    let client = ScriptedClient::new(vec![
        Ok(quiz_json(5)),
        Ok(report_json(50, false)),
        Err(PipelineError::GenerationFailure("overloaded".to_string())),
    ]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert!(!output.refinement.was_refined());
    assert_eq!(output.refinement.initial_score(), 50);
    assert_eq!(output.refinement.final_score(), 50);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::RefinementFailed);
    assert_eq!(output.artifact.item_count(), 5);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn malformed_refinement_counts_as_refinement_failure() {
    let broken = json!({ "questions": [{ "question": "Q?", "options": ["a", "b"], "correct_index": 0 }] });
    let client = ScriptedClient::new(vec![
        Ok(quiz_json(5)),
        Ok(report_json(30, false)),
        Ok(broken),
    ]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert_eq!(output.refinement.outcome(), RefinementOutcome::RefinementFailed);
    assert_eq!(output.artifact.item_count(), 5);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn unavailable_validation_returns_unscored_artifact() {
    let client = ScriptedClient::new(vec![
        Ok(quiz_json(5)),
        Err(PipelineError::GenerationFailure("timeout".to_string())),
    ]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert!(!output.refinement.was_refined());
    assert_eq!(output.refinement.initial_score(), 0);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::ValidationUnavailable);
    assert!(output.report.is_none());
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn report_without_score_counts_as_unavailable() {
    let client = ScriptedClient::new(vec![
        Ok(quiz_json(5)),
        Ok(json!({ "is_valid": true, "issues": [] })),
    ]);
    let pipeline = scripted_pipeline(client, PipelineSettings::default());

    let output = pipeline.run(&quiz_request()).await.unwrap();
    assert_eq!(output.refinement.outcome(), RefinementOutcome::ValidationUnavailable);
}

#[tokio::test]
async fn unavailable_revalidation_discards_refined_artifact() {
    let client = ScriptedClient::new(vec![
        Ok(flashcards_json(10, "Draft")),
        Ok(report_json(60, false)),
        Ok(flashcards_json(10, "Refined")),
        Err(PipelineError::GenerationFailure("connection reset".to_string())),
    ]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());

    let output = pipeline.run(&flashcard_request()).await.unwrap();

    assert!(!output.refinement.was_refined());
    assert_eq!(output.refinement.initial_score(), 60);
    assert_eq!(output.refinement.final_score(), 60);
    assert_eq!(
        output.refinement.outcome(),
        RefinementOutcome::RevalidationUnavailable
    );
    let cards = output.artifact.as_flashcards().unwrap();
    assert_eq!(cards.flashcards[0].front, "Draft term 1");
    assert_eq!(client.calls(), 4);
}

#[tokio::test]
async fn pre_cancelled_token_stops_before_generation() {
    let client = ScriptedClient::new(vec![Ok(quiz_json(5))]);
    let pipeline = scripted_pipeline(Arc::clone(&client), PipelineSettings::default());
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .run_with_cancel(&quiz_request(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(ref stage) if stage == "generating"));
    assert_eq!(client.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_validation_is_fatal() {
    let generator = ScriptedClient::new(vec![Ok(quiz_json(5))]);
    let pipeline = Pipeline::new(
        generator,
        Arc::new(SilentValidator),
        FakeRefiner::new(Err(PipelineError::RefinementFailure("unused".to_string()))),
        PipelineSettings::default(),
    );
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = pipeline
        .run_with_cancel(&quiz_request(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled(ref stage) if stage == "validating"));
}

#[tokio::test(start_paused = true)]
async fn silent_generator_hits_the_call_deadline() {
    let settings = PipelineSettings {
        call_timeout: Duration::from_secs(5),
        ..PipelineSettings::default()
    };
    let pipeline = Pipeline::from_client(Arc::new(SilentClient), settings);

    let err = pipeline.run(&quiz_request()).await.unwrap_err();

    assert!(matches!(err, PipelineError::GenerationFailure(_)));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn count_mismatch_is_tolerated() {
    let client = ScriptedClient::new(vec![Ok(quiz_json(3)), Ok(report_json(96, true))]);
    let pipeline = scripted_pipeline(client, PipelineSettings::default());

    let output = pipeline
        .run(&quiz_request().with_count(5))
        .await
        .unwrap();

    assert_eq!(output.artifact.item_count(), 3);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::PassedGate);
}

#[tokio::test]
async fn disabled_refinement_keeps_the_scored_artifact() {
    let settings = PipelineSettings {
        refinement_enabled: false,
        ..PipelineSettings::default()
    };
    let client = ScriptedClient::new(vec![Ok(quiz_json(5)), Ok(report_json(55, false))]);
    let pipeline = scripted_pipeline(Arc::clone(&client), settings);

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert!(!output.refinement.was_refined());
    assert_eq!(output.refinement.final_score(), 55);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::RefinementDisabled);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn valid_report_below_threshold_triggers_refinement() {
    let validator = FakeValidator::new(vec![Ok(report(85, true)), Ok(report(91, true))]);
    let replacement =
        studia::schema::conform(ArtifactKind::Quiz, quiz_json(5), &quiz_request()).unwrap();
    let refiner = FakeRefiner::new(Ok(replacement));
    let pipeline = Pipeline::new(
        ScriptedClient::new(vec![Ok(quiz_json(5))]),
        Arc::clone(&validator) as Arc<dyn studia::validator::Validator>,
        Arc::clone(&refiner) as Arc<dyn studia::refiner::Refiner>,
        PipelineSettings::default(),
    );

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert_eq!(output.refinement.initial_score(), 85);
    assert_eq!(output.refinement.final_score(), 91);
    assert_eq!(validator.calls(), 2);
    assert_eq!(refiner.calls(), 1);
}

#[tokio::test]
async fn invalid_report_with_high_score_still_refines() {
    let validator = FakeValidator::new(vec![Ok(report(97, false)), Ok(report(97, true))]);
    let refiner = FakeRefiner::new(Err(PipelineError::RefinementFailure("no".to_string())));
    let pipeline = Pipeline::new(
        ScriptedClient::new(vec![Ok(quiz_json(5))]),
        Arc::clone(&validator) as Arc<dyn studia::validator::Validator>,
        Arc::clone(&refiner) as Arc<dyn studia::refiner::Refiner>,
        PipelineSettings::default(),
    );

    let output = pipeline.run(&quiz_request()).await.unwrap();

    assert_eq!(refiner.calls(), 1);
    assert_eq!(output.refinement.outcome(), RefinementOutcome::RefinementFailed);
    assert_eq!(validator.calls(), 1);
}

/// Validator that never answers.
struct SilentValidator;

#[async_trait::async_trait]
impl studia::validator::Validator for SilentValidator {
    async fn validate(
        &self,
        _source: &SourceMaterial,
        _artifact: &Artifact,
    ) -> Result<studia::validator::ValidationReport, PipelineError> {
        std::future::pending::<()>().await;
        Err(PipelineError::ValidationUnavailable("unreachable".to_string()))
    }
}
