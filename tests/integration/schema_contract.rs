//! Structural contract shared by generation, refinement and strategies.

use super::support::*;
use serde_json::json;
use studia::artifact::Artifact;
use studia::error::PipelineError;
use studia::schema::{self, count_mismatch};
use studia::strategy::strategy_for;
use studia::types::{ArtifactKind, Difficulty, GenerationRequest, PageImage, SourceMaterial};

const KINDS: [ArtifactKind; 4] = [
    ArtifactKind::Quiz,
    ArtifactKind::Flashcards,
    ArtifactKind::ExtractedText,
    ArtifactKind::MasteryModule,
];

#[test]
fn every_kind_has_a_matching_strategy() {
    for kind in KINDS {
        assert_eq!(strategy_for(kind).kind(), kind);
    }
    assert_eq!(strategy_for(ArtifactKind::Quiz).root_key(), "questions");
    assert_eq!(strategy_for(ArtifactKind::Flashcards).root_key(), "flashcards");
    assert_eq!(strategy_for(ArtifactKind::MasteryModule).root_key(), "steps");
}

#[test]
fn conformed_artifacts_pass_their_own_check() {
    let request = GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text(COURSE));
    let quiz = schema::conform(ArtifactKind::Quiz, quiz_json(5), &request).unwrap();
    assert!(schema::check(&quiz).is_ok());

    let request = GenerationRequest::new(ArtifactKind::Flashcards, SourceMaterial::text(COURSE));
    let cards = schema::conform(ArtifactKind::Flashcards, flashcards_json(3, "T"), &request).unwrap();
    assert!(strategy_for(ArtifactKind::Flashcards).check(&cards).is_ok());
}

#[test]
fn strategy_rejects_an_artifact_of_another_kind() {
    let request = GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text(COURSE));
    let quiz = schema::conform(ArtifactKind::Quiz, quiz_json(1), &request).unwrap();
    let err = strategy_for(ArtifactKind::Flashcards).check(&quiz).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedArtifact(_)));
}

#[test]
fn bare_array_is_accepted_as_the_collection() {
    let request = GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text(COURSE));
    let body = json!([question(1, 3), question(2, 1)]);
    let artifact = schema::conform(ArtifactKind::Quiz, body, &request).unwrap();
    assert_eq!(artifact.item_count(), 2);
}

#[test]
fn transcription_accepts_plain_text_or_text_object() {
    let request = GenerationRequest::new(
        ArtifactKind::ExtractedText,
        SourceMaterial::Page(PageImage::new("image/png", "QUJD")),
    );
    let plain = schema::conform(ArtifactKind::ExtractedText, json!("# Title\nBody"), &request).unwrap();
    let object =
        schema::conform(ArtifactKind::ExtractedText, json!({ "text": "# Title\nBody" }), &request)
            .unwrap();
    assert_eq!(plain, object);
    assert!(matches!(plain, Artifact::ExtractedText(_)));
}

#[test]
fn mastery_step_cards_fall_back_to_request_difficulty() {
    let request = GenerationRequest::new(ArtifactKind::MasteryModule, SourceMaterial::text(COURSE))
        .with_difficulty(Difficulty::Easy);
    let body = json!({
        "steps": [
            { "type": "flashcards", "cards": [{ "front": "ATP", "back": "Energy carrier" }] }
        ]
    });
    let artifact = schema::conform(ArtifactKind::MasteryModule, body, &request).unwrap();
    let module = artifact.as_mastery_module().unwrap();
    assert!(!module.title.is_empty());
    match &module.steps[0] {
        studia::artifact::MasteryStep::Flashcards { cards, .. } => {
            assert_eq!(cards[0].difficulty, Difficulty::Easy);
        }
        other => panic!("unexpected step {:?}", other),
    }
}

#[test]
fn count_mismatch_ignores_transcriptions() {
    let request = GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text(COURSE));
    let quiz = schema::conform(ArtifactKind::Quiz, quiz_json(3), &request).unwrap();
    let mismatch = count_mismatch(&quiz, Some(5)).unwrap();
    assert_eq!((mismatch.expected, mismatch.actual), (5, 3));
    assert!(count_mismatch(&quiz, Some(3)).is_none());
    assert!(strategy_for(ArtifactKind::ExtractedText)
        .expected_count(&request)
        .is_none());
}
