//! Student answer evaluation for practice steps.

use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::prompt::{excerpt, Prompt, PromptBudgets};
use crate::prompt::templates::JSON_ONLY_SYSTEM;
use crate::validator::score_from;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub is_correct: bool,
    pub feedback: String,
    pub score: u8,
}

#[derive(Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    is_correct: bool,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    score: Option<Value>,
}

/// Grades a free-text answer against a course excerpt.
pub struct AnswerEvaluator {
    client: Arc<dyn GenerationClient>,
    budgets: PromptBudgets,
}

impl AnswerEvaluator {
    pub fn new(client: Arc<dyn GenerationClient>, budgets: PromptBudgets) -> Self {
        Self { client, budgets }
    }

    pub async fn evaluate(
        &self,
        instruction: &str,
        answer: &str,
        context: &str,
    ) -> Result<AnswerEvaluation, PipelineError> {
        if instruction.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("Instruction is empty".to_string()));
        }
        if answer.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("Answer is empty".to_string()));
        }

        let prompt = evaluation_prompt(instruction, answer, context, &self.budgets);
        let value = self.client.generate(&prompt).await?;
        let evaluation = parse_evaluation(value)?;
        debug!(
            is_correct = evaluation.is_correct,
            score = evaluation.score,
            answer_len = answer.chars().count(),
            "Answer evaluated"
        );
        Ok(evaluation)
    }
}

pub fn evaluation_prompt(
    instruction: &str,
    answer: &str,
    context: &str,
    budgets: &PromptBudgets,
) -> Prompt {
    let mut user = format!(
        "You are a teacher correcting a student.\n\n\
         CONTEXT:\n{context}\n\n\
         QUESTION/INSTRUCTION: {instruction}\n\
         STUDENT ANSWER: {answer}\n\n\
         Evaluate the answer based on the context only.\n\n\
         Return JSON:\n\
         {{\n  \"is_correct\": true,\n  \"feedback\": \"Detailed feedback explaining why it is right or wrong.\",\n  \"score\": 80\n}}\n",
        context = excerpt(context, budgets.evaluation_chars),
        instruction = instruction.trim(),
        answer = answer.trim(),
    );
    if let Some(language) = budgets.language_rule() {
        user.push_str(&language);
        user.push('\n');
    }
    Prompt::json(JSON_ONLY_SYSTEM, user)
}

fn parse_evaluation(value: Value) -> Result<AnswerEvaluation, PipelineError> {
    let raw: RawEvaluation = serde_json::from_value(value).map_err(|e| {
        PipelineError::GenerationFailure(format!("Unreadable evaluation: {}", e))
    })?;
    let score = match raw.score.as_ref().and_then(score_from) {
        Some(score) => score.clamp(0, 100) as u8,
        None if raw.is_correct => 100,
        None => 0,
    };
    Ok(AnswerEvaluation {
        is_correct: raw.is_correct,
        feedback: raw.feedback,
        score,
    })
}
