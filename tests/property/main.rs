//! Property-based tests for excerpting and the structural contract

use proptest::prelude::*;
use serde_json::json;
use studia::artifact::{Artifact, Flashcard, FlashcardSet, QuizQuestion, QuizSet};
use studia::error::PipelineError;
use studia::pipeline::{RefinementMetadata, RefinementOutcome};
use studia::prompt::{excerpt, TRUNCATION_MARKER};
use studia::schema;
use studia::types::{ArtifactKind, Difficulty, GenerationRequest, SourceMaterial};
use studia::validator::ValidationReport;

fn quiz_request() -> GenerationRequest {
    GenerationRequest::new(ArtifactKind::Quiz, SourceMaterial::text("course text for properties"))
}

fn question_strategy() -> impl Strategy<Value = (String, [String; 4], i64)> {
    (
        "[a-zA-Z?]{1,40}",
        prop::array::uniform4("[a-z ]{0,12}"),
        0i64..4,
    )
}

/// Quiz or flashcard sets built directly, so out-of-range indexes and blank
/// fields reach the checker without passing through conform.
fn artifact_strategy() -> impl Strategy<Value = Artifact> {
    let question = ("[a-z ?]{0,20}", prop::array::uniform4("[a-z]{0,6}"), 0usize..8).prop_map(
        |(question, options, correct_index)| QuizQuestion {
            question,
            options,
            correct_index,
            explanation: String::new(),
        },
    );
    let card = ("[a-z ]{0,12}", "[a-z ]{0,12}").prop_map(|(front, back)| Flashcard {
        front,
        back,
        category: "General".to_string(),
        difficulty: Difficulty::Medium,
    });
    prop_oneof![
        prop::collection::vec(question, 0..6).prop_map(|questions| Artifact::Quiz(QuizSet { questions })),
        prop::collection::vec(card, 0..6)
            .prop_map(|flashcards| Artifact::Flashcards(FlashcardSet { flashcards })),
    ]
}

proptest! {
    /// An excerpt is the source itself or a char-prefix of exactly `budget` chars plus the marker
    #[test]
    fn excerpt_is_bounded_prefix(source in ".{0,300}", budget in 0usize..200) {
        let cut = excerpt(&source, budget);
        if source.chars().count() <= budget {
            prop_assert_eq!(cut, source);
        } else {
            let body = cut.strip_suffix(TRUNCATION_MARKER).expect("marker");
            prop_assert_eq!(body.chars().count(), budget);
            prop_assert!(source.starts_with(body));
        }
    }

    /// Whatever conform accepts, check accepts too, and item count is preserved
    #[test]
    fn conformed_quiz_always_passes_check(items in prop::collection::vec(question_strategy(), 1..12)) {
        let body = json!({
            "questions": items.iter().map(|(q, options, correct)| json!({
                "question": q,
                "options": options,
                "correct_index": correct,
                "explanation": "why"
            })).collect::<Vec<_>>()
        });
        let artifact = schema::conform(ArtifactKind::Quiz, body, &quiz_request()).unwrap();
        prop_assert_eq!(artifact.item_count(), items.len());
        prop_assert!(schema::check(&artifact).is_ok());
    }

    /// Any answer index outside 0..=3 is rejected as malformed
    #[test]
    fn out_of_range_index_never_conforms(index in prop_oneof![i64::MIN..0, 4i64..i64::MAX]) {
        let body = json!({
            "questions": [{
                "question": "Q?",
                "options": ["a", "b", "c", "d"],
                "correct_index": index
            }]
        });
        let err = schema::conform(ArtifactKind::Quiz, body, &quiz_request()).unwrap_err();
        prop_assert!(matches!(err, PipelineError::MalformedArtifact(_)));
    }

    /// Scores are clamped into 0..=100 and a gate pass implies validity
    #[test]
    fn report_score_is_clamped(score in any::<i64>(), valid in any::<bool>(), threshold in 0u8..=100) {
        let report = ValidationReport::new(valid, score, Vec::new(), "");
        prop_assert!(report.score <= 100);
        if report.passes_gate(threshold) {
            prop_assert!(report.is_valid);
            prop_assert!(report.score >= threshold);
        }
    }

    /// Unrefined metadata never reports a score change
    #[test]
    fn unrefined_metadata_has_equal_scores(score in 0u8..=100) {
        let metadata = RefinementMetadata::unrefined(score, RefinementOutcome::RefinementFailed);
        prop_assert!(!metadata.was_refined());
        prop_assert_eq!(metadata.initial_score(), metadata.final_score());
    }

    /// Checking the same artifact twice gives the same verdict and message
    #[test]
    fn schema_check_is_idempotent(artifact in artifact_strategy()) {
        let first = schema::check(&artifact).map_err(|e| e.to_string());
        let second = schema::check(&artifact).map_err(|e| e.to_string());
        let broken = match &artifact {
            Artifact::Quiz(set) => set
                .questions
                .iter()
                .any(|q| q.question.trim().is_empty() || q.correct_index >= 4),
            Artifact::Flashcards(set) => set
                .flashcards
                .iter()
                .any(|c| c.front.trim().is_empty() || c.back.trim().is_empty()),
            _ => false,
        };
        prop_assert_eq!(first.is_err(), broken);
        prop_assert_eq!(first, second);
    }
}
