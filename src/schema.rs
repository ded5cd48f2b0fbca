//! Schema contract: the structural shape each artifact kind must satisfy.
//!
//! [`conform`] turns the loosely-typed JSON returned by the generative
//! capability into a typed [`Artifact`], filling optional fields with their
//! defaults and rejecting required-field violations. [`check`] re-asserts the
//! same invariants on an already-typed artifact and is a pure function.
//!
//! A response that is not shaped like the requested kind at all (wrong JSON
//! type, missing root collection) is a generation failure; a response with the
//! right shape but a broken item is a malformed artifact.

use crate::artifact::{
    Artifact, ExtractedText, Flashcard, FlashcardSet, MasteryModule, MasteryStep, QuizQuestion,
    QuizSet, DEFAULT_CATEGORY, QUIZ_OPTION_COUNT,
};
use crate::error::PipelineError;
use crate::types::{ArtifactKind, Difficulty, GenerationRequest};
use serde::Deserialize;
use serde_json::Value;

pub const KEY_QUESTIONS: &str = "questions";
pub const KEY_FLASHCARDS: &str = "flashcards";
pub const KEY_TEXT: &str = "text";
pub const KEY_STEPS: &str = "steps";

const DEFAULT_MODULE_TITLE: &str = "Mastery session";

const XP_THEORY: u32 = 20;
const XP_FLASHCARDS: u32 = 30;
const XP_QUIZ: u32 = 50;
const XP_PRACTICE: u32 = 100;

/// Difference between the requested and produced item counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Coerce a generated JSON value into a typed artifact of `kind`.
pub fn conform(
    kind: ArtifactKind,
    value: Value,
    request: &GenerationRequest,
) -> Result<Artifact, PipelineError> {
    match kind {
        ArtifactKind::Quiz => {
            let items = root_collection(value, KEY_QUESTIONS, kind)?;
            let questions = conform_questions(items, "")?;
            Ok(Artifact::Quiz(QuizSet { questions }))
        }
        ArtifactKind::Flashcards => {
            let items = root_collection(value, KEY_FLASHCARDS, kind)?;
            let flashcards = conform_cards(items, request.difficulty, "")?;
            Ok(Artifact::Flashcards(FlashcardSet { flashcards }))
        }
        ArtifactKind::ExtractedText => conform_extracted_text(value),
        ArtifactKind::MasteryModule => conform_mastery(value, request.difficulty),
    }
}

/// Re-check the structural invariants of a typed artifact.
pub fn check(artifact: &Artifact) -> Result<(), PipelineError> {
    match artifact {
        Artifact::Quiz(set) => check_questions(&set.questions, ""),
        Artifact::Flashcards(set) => check_cards(&set.flashcards, ""),
        Artifact::ExtractedText(_) => Ok(()),
        Artifact::MasteryModule(module) => {
            if module.steps.is_empty() {
                return Err(malformed("Mastery module has no steps"));
            }
            for (index, step) in module.steps.iter().enumerate() {
                let label = format!("Step {}", index + 1);
                match step {
                    MasteryStep::Theory { content, .. } if content.trim().is_empty() => {
                        return Err(malformed(format!("{}: empty theory content", label)));
                    }
                    MasteryStep::Practice { instruction, .. } if instruction.trim().is_empty() => {
                        return Err(malformed(format!("{}: empty practice instruction", label)));
                    }
                    MasteryStep::Flashcards { cards, .. } => {
                        if cards.is_empty() {
                            return Err(malformed(format!("{}: no flashcards", label)));
                        }
                        check_cards(cards, &format!("{} ", label))?;
                    }
                    MasteryStep::Quiz { questions, .. } => {
                        if questions.is_empty() {
                            return Err(malformed(format!("{}: no questions", label)));
                        }
                        check_questions(questions, &format!("{} ", label))?;
                    }
                    _ => {}
                }
            }
            Ok(())
        }
    }
}

/// Report a mismatch between the produced and expected item count, if any.
pub fn count_mismatch(artifact: &Artifact, expected: Option<usize>) -> Option<CountMismatch> {
    let expected = expected?;
    if matches!(artifact, Artifact::ExtractedText(_)) {
        return None;
    }
    let actual = artifact.item_count();
    (actual != expected).then_some(CountMismatch { expected, actual })
}

fn malformed(message: impl Into<String>) -> PipelineError {
    PipelineError::MalformedArtifact(message.into())
}

fn root_collection(value: Value, key: &str, kind: ArtifactKind) -> Result<Vec<Value>, PipelineError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(PipelineError::GenerationFailure(format!(
                "Invalid {} format: '{}' is not an array",
                kind, key
            ))),
            None => Err(PipelineError::GenerationFailure(format!(
                "Invalid {} format: missing '{}' key",
                kind, key
            ))),
        },
        other => Err(PipelineError::GenerationFailure(format!(
            "Invalid {} format: expected a JSON object, got {}",
            kind,
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Deserialize)]
struct RawQuizQuestion {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default, alias = "correctAnswer", alias = "correct_answer")]
    correct_index: Option<Value>,
    #[serde(default)]
    explanation: Option<String>,
}

fn conform_questions(items: Vec<Value>, prefix: &str) -> Result<Vec<QuizQuestion>, PipelineError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| conform_question(&format!("{}Question {}", prefix, index + 1), item))
        .collect()
}

fn conform_question(label: &str, item: Value) -> Result<QuizQuestion, PipelineError> {
    let raw: RawQuizQuestion = serde_json::from_value(item)
        .map_err(|e| malformed(format!("{}: {}", label, e)))?;

    let question = non_blank(raw.question)
        .ok_or_else(|| malformed(format!("{}: missing 'question' field", label)))?;
    let options = raw
        .options
        .ok_or_else(|| malformed(format!("{}: missing 'options' field", label)))?;
    let option_count = options.len();
    let options: [String; QUIZ_OPTION_COUNT] = options.try_into().map_err(|_| {
        malformed(format!(
            "{}: must have exactly {} options, got {}",
            label, QUIZ_OPTION_COUNT, option_count
        ))
    })?;
    let raw_index = raw
        .correct_index
        .ok_or_else(|| malformed(format!("{}: missing 'correct_index' field", label)))?;
    let correct_index = index_from(&raw_index).ok_or_else(|| {
        malformed(format!(
            "{}: correct_index must be an integer, got {}",
            label, raw_index
        ))
    })?;
    if !(0..QUIZ_OPTION_COUNT as i64).contains(&correct_index) {
        return Err(malformed(format!(
            "{}: correct_index must be 0-{}, got {}",
            label,
            QUIZ_OPTION_COUNT - 1,
            correct_index
        )));
    }

    Ok(QuizQuestion {
        question,
        options,
        correct_index: correct_index as usize,
        explanation: raw.explanation.unwrap_or_default(),
    })
}

/// Answer index as an integer; `2`, `2.0` and `"2"` are all accepted.
fn index_from(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => return Some(i),
            None => n.as_f64()?,
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(i);
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (number.is_finite() && number.fract() == 0.0).then(|| number as i64)
}

fn check_questions(questions: &[QuizQuestion], prefix: &str) -> Result<(), PipelineError> {
    for (index, question) in questions.iter().enumerate() {
        let label = format!("{}Question {}", prefix, index + 1);
        if question.question.trim().is_empty() {
            return Err(malformed(format!("{}: missing 'question' field", label)));
        }
        if question.correct_index >= QUIZ_OPTION_COUNT {
            return Err(malformed(format!(
                "{}: correct_index must be 0-{}, got {}",
                label,
                QUIZ_OPTION_COUNT - 1,
                question.correct_index
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawFlashcard {
    #[serde(default)]
    front: Option<String>,
    #[serde(default)]
    back: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
}

fn conform_cards(
    items: Vec<Value>,
    fallback: Difficulty,
    prefix: &str,
) -> Result<Vec<Flashcard>, PipelineError> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            conform_card(&format!("{}Flashcard {}", prefix, index + 1), item, fallback)
        })
        .collect()
}

fn conform_card(label: &str, item: Value, fallback: Difficulty) -> Result<Flashcard, PipelineError> {
    let raw: RawFlashcard = serde_json::from_value(item)
        .map_err(|e| malformed(format!("{}: {}", label, e)))?;

    let front = non_blank(raw.front)
        .ok_or_else(|| malformed(format!("{}: missing 'front' field", label)))?;
    let back = non_blank(raw.back)
        .ok_or_else(|| malformed(format!("{}: missing 'back' field", label)))?;
    let category = non_blank(raw.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    let difficulty = raw
        .difficulty
        .and_then(|d| d.parse::<Difficulty>().ok())
        .unwrap_or(fallback);

    Ok(Flashcard {
        front,
        back,
        category,
        difficulty,
    })
}

fn check_cards(cards: &[Flashcard], prefix: &str) -> Result<(), PipelineError> {
    for (index, card) in cards.iter().enumerate() {
        let label = format!("{}Flashcard {}", prefix, index + 1);
        if card.front.trim().is_empty() {
            return Err(malformed(format!("{}: missing 'front' field", label)));
        }
        if card.back.trim().is_empty() {
            return Err(malformed(format!("{}: missing 'back' field", label)));
        }
    }
    Ok(())
}

fn conform_extracted_text(value: Value) -> Result<Artifact, PipelineError> {
    match value {
        Value::String(text) => Ok(Artifact::ExtractedText(ExtractedText { text })),
        Value::Object(mut map) => match map.remove(KEY_TEXT) {
            Some(Value::String(text)) => Ok(Artifact::ExtractedText(ExtractedText { text })),
            Some(other) => Err(malformed(format!(
                "'text' must be a string, got {}",
                json_type(&other)
            ))),
            None => Err(malformed("missing 'text' field")),
        },
        other => Err(PipelineError::GenerationFailure(format!(
            "Invalid extracted_text format: expected text, got {}",
            json_type(&other)
        ))),
    }
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(rename = "type", default)]
    step_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "flashcards")]
    cards: Option<Vec<Value>>,
    #[serde(default)]
    questions: Option<Vec<Value>>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    concept: Option<String>,
    #[serde(default)]
    xp: Option<u32>,
}

fn conform_mastery(value: Value, fallback: Difficulty) -> Result<Artifact, PipelineError> {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(PipelineError::GenerationFailure(format!(
                "Invalid mastery_module format: expected a JSON object, got {}",
                json_type(&other)
            )))
        }
    };
    let steps = match map.remove(KEY_STEPS).or_else(|| map.remove("modules")) {
        Some(Value::Array(steps)) => steps,
        Some(_) => {
            return Err(PipelineError::GenerationFailure(
                "Invalid mastery_module format: 'steps' is not an array".to_string(),
            ))
        }
        None => {
            return Err(PipelineError::GenerationFailure(
                "Invalid mastery_module format: missing 'steps' key".to_string(),
            ))
        }
    };
    let title = non_blank(
        map.remove("title")
            .and_then(|t| t.as_str().map(str::to_string)),
    )
    .unwrap_or_else(|| DEFAULT_MODULE_TITLE.to_string());

    if steps.is_empty() {
        return Err(malformed("Mastery module has no steps"));
    }

    let steps = steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| conform_step(index, step, fallback))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Artifact::MasteryModule(MasteryModule { title, steps }))
}

fn conform_step(index: usize, item: Value, fallback: Difficulty) -> Result<MasteryStep, PipelineError> {
    let label = format!("Step {}", index + 1);
    let raw: RawStep = serde_json::from_value(item)
        .map_err(|e| malformed(format!("{}: {}", label, e)))?;
    let step_type = raw
        .step_type
        .ok_or_else(|| malformed(format!("{}: missing 'type' field", label)))?;

    match step_type.to_ascii_lowercase().as_str() {
        "theory" => {
            let content = non_blank(raw.content)
                .ok_or_else(|| malformed(format!("{}: missing 'content' field", label)))?;
            Ok(MasteryStep::Theory {
                title: non_blank(raw.title).unwrap_or_else(|| "Key ideas".to_string()),
                content,
                xp: raw.xp.unwrap_or(XP_THEORY),
            })
        }
        "flashcards" => {
            let cards = raw.cards.unwrap_or_default();
            if cards.is_empty() {
                return Err(malformed(format!("{}: no flashcards", label)));
            }
            Ok(MasteryStep::Flashcards {
                cards: conform_cards(cards, fallback, &format!("{} ", label))?,
                xp: raw.xp.unwrap_or(XP_FLASHCARDS),
            })
        }
        "quiz" => {
            let questions = raw.questions.unwrap_or_default();
            if questions.is_empty() {
                return Err(malformed(format!("{}: no questions", label)));
            }
            Ok(MasteryStep::Quiz {
                questions: conform_questions(questions, &format!("{} ", label))?,
                xp: raw.xp.unwrap_or(XP_QUIZ),
            })
        }
        "practice" | "feynman" | "synthesis" | "quiz_open" => {
            let instruction = non_blank(raw.instruction)
                .ok_or_else(|| malformed(format!("{}: missing 'instruction' field", label)))?;
            Ok(MasteryStep::Practice {
                instruction,
                concept: non_blank(raw.concept),
                xp: raw.xp.unwrap_or(XP_PRACTICE),
            })
        }
        other => Err(malformed(format!("{}: unknown step type '{}'", label, other))),
    }
}
