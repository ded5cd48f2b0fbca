//! CLI presentation: text and JSON rendering of command results.

use crate::artifact::{Artifact, MasteryModule, MasteryStep};
use crate::config::{StudiaConfig, ValidationError};
use crate::error::PipelineError;
use crate::evaluation::AnswerEvaluation;
use crate::pipeline::RefinementMetadata;
use crate::study::{ExtractedDocument, StudyRecord};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Green at 90 and above, yellow from 60, red below.
pub fn format_score(score: u8) -> String {
    let label = format!("{}/100", score);
    if score >= 90 {
        format!("{}", label.green())
    } else if score >= 60 {
        format!("{}", label.yellow())
    } else {
        format!("{}", label.red())
    }
}

pub fn format_json<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::GenerationFailure(format!("Failed to render JSON: {}", e)))
}

pub fn format_refinement(meta: &RefinementMetadata) -> String {
    if meta.was_refined() {
        format!(
            "Quality: {} -> {} ({})",
            format_score(meta.initial_score()),
            format_score(meta.final_score()),
            meta.outcome()
        )
    } else {
        format!(
            "Quality: {} ({})",
            format_score(meta.final_score()),
            meta.outcome()
        )
    }
}

pub fn format_record_text(record: &StudyRecord) -> String {
    let mut output = String::new();
    output.push_str(&format_section_heading(&format!(
        "{} ({}, {} items)",
        record.kind,
        record.difficulty,
        record.artifact.item_count()
    )));
    output.push('\n');
    output.push_str(&format!("Id: {}\n", record.id));
    output.push_str(&format_refinement(&record.refinement));
    output.push_str("\n\n");

    if let Some(text) = &record.extracted_text {
        output.push_str(&format_section_heading("Extracted text"));
        output.push('\n');
        output.push_str(text.trim());
        output.push_str("\n\n");
    }

    output.push_str(&format_artifact_text(&record.artifact));
    output
}

pub fn format_artifact_text(artifact: &Artifact) -> String {
    match artifact {
        Artifact::Quiz(quiz) => {
            let mut output = String::new();
            for (i, question) in quiz.questions.iter().enumerate() {
                output.push_str(&format!("{}. {}\n", i + 1, question.question.bold()));
                for (label, option) in OPTION_LABELS.iter().zip(question.options.iter()) {
                    output.push_str(&format!("   {}) {}\n", label, option));
                }
                let answer = OPTION_LABELS
                    .get(question.correct_index)
                    .copied()
                    .unwrap_or('?');
                output.push_str(&format!(
                    "   {} {}\n   {}\n\n",
                    "Answer:".green(),
                    answer,
                    question.explanation.dimmed()
                ));
            }
            output.trim_end().to_string()
        }
        Artifact::Flashcards(set) => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["#", "Front", "Back", "Category", "Difficulty"]);
            for (i, card) in set.flashcards.iter().enumerate() {
                table.add_row(vec![
                    (i + 1).to_string(),
                    card.front.clone(),
                    card.back.clone(),
                    card.category.clone(),
                    card.difficulty.to_string(),
                ]);
            }
            table.to_string()
        }
        Artifact::ExtractedText(extracted) => {
            format!("{}\n\nWords: {}", extracted.text.trim(), extracted.word_count())
        }
        Artifact::MasteryModule(module) => format_mastery_text(module),
    }
}

fn format_mastery_text(module: &MasteryModule) -> String {
    let mut output = format!("{}\n", module.title.bold());
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Step", "Type", "Summary", "XP"]);
    for (i, step) in module.steps.iter().enumerate() {
        let (label, summary) = match step {
            MasteryStep::Theory { title, .. } => ("theory", title.clone()),
            MasteryStep::Flashcards { cards, .. } => ("flashcards", format!("{} cards", cards.len())),
            MasteryStep::Quiz { questions, .. } => {
                ("quiz", format!("{} questions", questions.len()))
            }
            MasteryStep::Practice { instruction, .. } => ("practice", instruction.clone()),
        };
        table.add_row(vec![
            (i + 1).to_string(),
            label.to_string(),
            summary,
            step.xp().to_string(),
        ]);
    }
    output.push_str(&table.to_string());
    output.push_str(&format!("\nTotal XP: {}", module.total_xp()));
    output
}

pub fn format_document_text(document: &ExtractedDocument) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Page", "Words", "Quality", "Outcome"]);
    for page in &document.pages {
        table.add_row(vec![
            page.page_number.to_string(),
            page.word_count.to_string(),
            format!("{}/100", page.refinement.final_score()),
            page.refinement.outcome().to_string(),
        ]);
    }

    let mut output = String::new();
    output.push_str(&format_section_heading(&format!(
        "Extracted {} page(s), {} words",
        document.pages.len(),
        document.total_words()
    )));
    output.push('\n');
    output.push_str(&table.to_string());
    output.push('\n');
    output.push_str(&document.combined_text);
    output
}

pub fn format_evaluation_text(evaluation: &AnswerEvaluation) -> String {
    let verdict = if evaluation.is_correct {
        format!("{}", "Correct".green().bold())
    } else {
        format!("{}", "Not quite".red().bold())
    };
    format!(
        "{}  {}\n{}",
        verdict,
        format_score(evaluation.score),
        evaluation.feedback
    )
}

pub fn format_config_validation(config: &StudiaConfig) -> String {
    match config.validate() {
        Ok(()) => format!("{} Configuration is valid", "OK".green()),
        Err(errors) => format_validation_errors(&errors),
    }
}

pub fn format_validation_errors(errors: &[ValidationError]) -> String {
    let mut output = format!("{} Configuration has {} error(s):", "ERROR".red(), errors.len());
    for error in errors {
        output.push_str(&format!("\n  - {}", error));
    }
    output
}
