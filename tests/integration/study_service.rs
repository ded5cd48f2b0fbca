//! Study service operations over a routed generation client.

use super::support::*;
use serde_json::{json, Value};
use std::sync::Arc;
use studia::artifact::MasteryStep;
use studia::cancel::CancellationToken;
use studia::error::PipelineError;
use studia::pipeline::{PipelineSettings, RefinementOutcome};
use studia::prompt::{Prompt, ResponseFormat};
use studia::study::{StudyOptions, StudyService, MAX_PAGES, MAX_PAGE_BYTES};
use studia::types::{ArtifactKind, Difficulty, PageImage};

/// Transcribes a page as the text its payload names; reviews score 95.
fn page_router(prompt: &Prompt) -> Result<Value, PipelineError> {
    if is_validation_prompt(prompt) {
        return Ok(report_json(95, true));
    }
    if prompt.format == ResponseFormat::Text {
        let payload = prompt
            .images
            .first()
            .map(|image| image.data_base64.clone())
            .unwrap_or_default();
        return match payload.as_str() {
            "blank" => Ok(Value::String("  ".to_string())),
            "short" => Ok(Value::String("Hi".to_string())),
            "broken" => Err(PipelineError::GenerationFailure("vision failed".to_string())),
            other => Ok(Value::String(format!(
                "Page {} explains how the Calvin cycle fixes carbon",
                other
            ))),
        };
    }
    Ok(quiz_json(5))
}

fn service<F>(client: Arc<RoutedClient<F>>) -> StudyService
where
    F: Fn(&Prompt) -> Result<Value, PipelineError> + Send + Sync + 'static,
{
    StudyService::from_client(client, PipelineSettings::default(), 3)
}

fn page(payload: &str) -> PageImage {
    PageImage::new("image/png", payload)
}

#[tokio::test]
async fn extracted_pages_keep_submission_order() {
    let client = RoutedClient::new(page_router);
    let service = service(Arc::clone(&client));
    let images = ["one", "two", "three", "four", "five"].map(page).to_vec();

    let document = service
        .extract_pages(images, &CancellationToken::new())
        .await
        .unwrap();

    let numbers: Vec<usize> = document.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    assert!(document.pages[2].text.starts_with("Page three"));
    assert!(document.combined_text.starts_with("\n--- PAGE 1 ---\nPage one"));
    assert!(document.combined_text.contains("--- PAGE 5 ---"));
    assert_eq!(document.total_words(), 5 * 9);
    assert!(document
        .pages
        .iter()
        .all(|p| p.refinement.outcome() == RefinementOutcome::PassedGate));
    // One transcription and one review per page
    assert_eq!(client.calls(), 10);
}

#[tokio::test]
async fn blank_page_gets_a_placeholder() {
    let client = RoutedClient::new(page_router);
    let service = service(client);

    let document = service
        .extract_pages(vec![page("one"), page("blank")], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(document.pages[1].text, "[Page 2 - no text detected]");
    assert!(document.combined_text.contains("[Page 2 - no text detected]"));
}

#[tokio::test]
async fn one_failed_page_fails_the_extraction() {
    let client = RoutedClient::new(page_router);
    let service = service(client);

    let err = service
        .extract_pages(
            vec![page("one"), page("broken"), page("three")],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::GenerationFailure(_)));
}

#[tokio::test]
async fn page_limits_are_checked_before_any_call() {
    let client = RoutedClient::new(page_router);
    let service = service(Arc::clone(&client));
    let token = CancellationToken::new();

    let none = service.extract_pages(Vec::new(), &token).await.unwrap_err();
    assert!(matches!(none, PipelineError::InvalidRequest(_)));

    let too_many = vec![page("x"); MAX_PAGES + 1];
    let err = service.extract_pages(too_many, &token).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));

    let huge = PageImage::new("image/png", "A".repeat(MAX_PAGE_BYTES / 3 * 4 + 8));
    let err = service
        .extract_pages(vec![page("one"), huge], &token)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Image 2"));

    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn quiz_from_image_carries_the_transcription() {
    let client = RoutedClient::new(page_router);
    let service = service(client);

    let record = service
        .quiz_from_image(page("one"), StudyOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.kind, ArtifactKind::Quiz);
    assert_eq!(record.artifact.item_count(), 5);
    assert_eq!(
        record.extracted_text.as_deref(),
        Some("Page one explains how the Calvin cycle fixes carbon")
    );
}

#[tokio::test]
async fn quiz_from_image_rejects_a_near_empty_page() {
    let client = RoutedClient::new(page_router);
    let service = service(Arc::clone(&client));

    let err = service
        .quiz_from_image(page("short"), StudyOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    // Transcription and its review only; no quiz was generated
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn short_course_text_is_rejected() {
    let client = RoutedClient::new(page_router);
    let service = service(Arc::clone(&client));

    let err = service
        .quiz_from_text("  tiny  ", StudyOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidRequest(_)));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn flashcards_take_requested_difficulty_and_count() {
    let client = RoutedClient::new(|prompt: &Prompt| {
        if is_validation_prompt(prompt) {
            Ok(report_json(93, true))
        } else {
            Ok(json!({
                "flashcards": [
                    { "front": "Chlorophyll", "back": "Pigment absorbing blue and red light" },
                    { "front": "Calvin cycle", "back": "Fixes CO2 into sugars", "category": "Biology" }
                ]
            }))
        }
    });
    let service = service(Arc::clone(&client));
    let options = StudyOptions {
        count: Some(2),
        difficulty: Difficulty::Hard,
        subject: None,
    };

    let record = service
        .flashcards(COURSE, options, &CancellationToken::new())
        .await
        .unwrap();

    let set = record.artifact.as_flashcards().unwrap();
    assert_eq!(set.flashcards.len(), 2);
    assert_eq!(set.flashcards[0].category, "General");
    assert!(set.flashcards.iter().all(|c| c.difficulty == Difficulty::Hard));
    assert_eq!(record.difficulty, Difficulty::Hard);
    assert_eq!(record.refinement.final_score(), 93);
}

#[tokio::test]
async fn mastery_module_builds_typed_steps() {
    let client = RoutedClient::new(|prompt: &Prompt| {
        if is_validation_prompt(prompt) {
            return Ok(report_json(90, true));
        }
        Ok(json!({
            "title": "Photosynthesis",
            "steps": [
                { "type": "theory", "title": "Light", "content": "Chlorophyll absorbs light." },
                { "type": "flashcards", "cards": [{ "front": "ATP", "back": "Energy carrier" }] },
                { "type": "quiz", "questions": [question(1, 2)] },
                { "type": "practice", "instruction": "Explain the Calvin cycle in your own words." }
            ]
        }))
    });
    let service = service(client);

    let record = service
        .mastery_module(COURSE, StudyOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let module = record.artifact.as_mastery_module().unwrap();
    assert_eq!(module.title, "Photosynthesis");
    assert_eq!(module.steps.len(), 4);
    assert!(matches!(module.steps[0], MasteryStep::Theory { .. }));
    assert!(matches!(module.steps[3], MasteryStep::Practice { .. }));
    assert!(module.total_xp() > 0);
}

#[tokio::test]
async fn answer_evaluation_parses_the_grade() {
    let client = RoutedClient::new(|_prompt: &Prompt| {
        Ok(json!({ "is_correct": true, "feedback": "Well explained.", "score": 88 }))
    });
    let service = service(client);
    let token = CancellationToken::new();

    let evaluation = service
        .evaluate_answer(
            "Explain the Calvin cycle",
            "It fixes carbon dioxide into sugars",
            COURSE,
            &token,
        )
        .await
        .unwrap();
    assert!(evaluation.is_correct);
    assert_eq!(evaluation.score, 88);

    let err = service
        .evaluate_answer("Explain the Calvin cycle", "   ", COURSE, &token)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)));
}
