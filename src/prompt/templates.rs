//! Generation templates per artifact kind.
//!
//! Each template restates the schema contract as formatting rules, embeds a
//! bounded excerpt of the source and pins generation to that excerpt.

use super::{excerpt, Prompt, PromptBudgets};
use crate::strategy::strategy_for;
use crate::types::{Difficulty, GenerationRequest, SourceMaterial, Subject};

pub const JSON_ONLY_SYSTEM: &str =
    "You are an assistant that always answers with JSON only. No text before or after the JSON.";

pub const TRANSCRIBER_SYSTEM: &str =
    "You transcribe photographed course pages. You never add information or comments.";

pub const GROUNDING_RULE: &str =
    "- Use ONLY the content of the course above. Never use outside knowledge.";

const QUIZ_EXAMPLE: &str = r#"{
  "questions": [
    {
      "question": "Which formula for production does the course give?",
      "options": [
        "Production = Labour + Machines + Chance",
        "Production = Capital + Labour",
        "Production = Cost + Profit",
        "Production = Supply + Demand"
      ],
      "correct_index": 0,
      "explanation": "The course states that Production = Labour + Machines + Chance."
    }
  ]
}"#;

const MASTERY_EXAMPLE: &str = r#"{
  "title": "Short title of the session",
  "steps": [
    { "type": "theory", "title": "Key idea", "content": "Short explanation drawn from the course", "xp": 20 },
    { "type": "flashcards", "cards": [ { "front": "Concept", "back": "Definition", "category": "Topic", "difficulty": "medium" } ], "xp": 30 },
    { "type": "quiz", "questions": [ { "question": "...", "options": ["a", "b", "c", "d"], "correct_index": 2, "explanation": "..." } ], "xp": 50 },
    { "type": "practice", "concept": "Concept name", "instruction": "Explain the concept to a 5-year-old using an analogy.", "xp": 100 }
  ]
}"#;

/// Build the generation prompt for a request.
pub fn generation_prompt(request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
    strategy_for(request.kind).prompt(request, budgets)
}

/// Course block for the prompt body; page sources travel as an attachment.
pub(crate) fn course_block(source: &SourceMaterial, budget: usize) -> String {
    match source {
        SourceMaterial::Text(text) => excerpt(text, budget),
        SourceMaterial::Page(_) => "(the course is the attached page image)".to_string(),
    }
}

/// Attach the page image when the source is a photographed page.
pub(crate) fn attach_source(prompt: Prompt, source: &SourceMaterial) -> Prompt {
    match source.page() {
        Some(image) => prompt.with_image(image.clone()),
        None => prompt,
    }
}

fn quiz_difficulty(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Questions must be simple and direct, suited to beginners.",
        Difficulty::Medium => {
            "Questions must be of medium difficulty and require a good understanding of the course."
        }
        Difficulty::Hard => {
            "Questions must be hard and demand an in-depth knowledge of the course."
        }
    }
}

fn flashcard_difficulty(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Flashcards must cover basic concepts and simple definitions.",
        Difficulty::Medium => {
            "Flashcards must address intermediate concepts and their applications."
        }
        Difficulty::Hard => {
            "Flashcards must include advanced concepts and complex relationships."
        }
    }
}

/// Subject-specific guidance; the only thing a subject changes.
pub fn subject_guidance(subject: Option<Subject>) -> Option<&'static str> {
    match subject? {
        Subject::Mathematics => Some(
            "- Reproduce formulas and numbers exactly as written; prefer application and calculation items.",
        ),
        Subject::Sciences => {
            Some("- Focus on processes, causes and effects, and keep units and values exact.")
        }
        Subject::History => {
            Some("- Anchor items on dates, actors, causes and consequences named in the course.")
        }
        Subject::Languages => {
            Some("- Focus on vocabulary, grammar rules and usage examples found in the course.")
        }
        Subject::Programming => Some(
            "- Keep code identifiers and syntax exactly as written; prefer behaviour-reading items.",
        ),
    }
}

fn push_optional_rules(rules: &mut Vec<String>, request: &GenerationRequest, budgets: &PromptBudgets) {
    if let Some(guidance) = subject_guidance(request.subject) {
        rules.push(guidance.to_string());
    }
    if let Some(language) = budgets.language_rule() {
        rules.push(language);
    }
}

pub(crate) fn quiz_prompt(request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
    let count = request.expected_count().unwrap_or(5);
    let mut rules = vec![
        format!("- Exactly {} questions", count),
        "- Each question has EXACTLY 4 options".to_string(),
        "- correct_index is the index of the right answer (0, 1, 2 or 3)".to_string(),
        "- VARY the positions: do not always put the right answer at index 0".to_string(),
        "- Wrong options must be plausible but clearly false".to_string(),
        "- Every question has a short \"explanation\"".to_string(),
        GROUNDING_RULE.to_string(),
    ];
    push_optional_rules(&mut rules, request, budgets);
    rules.push("- No text before or after the JSON".to_string());

    let user = format!(
        "Create a quiz of {count} multiple-choice questions based ONLY on this course.\n\n\
         COURSE:\n{course}\n\n\
         DIFFICULTY: {difficulty}\n{difficulty_rule}\n\n\
         The JSON must look EXACTLY like this:\n{example}\n\n\
         IMPORTANT RULES:\n{rules}\n",
        count = count,
        course = course_block(&request.source, budgets.quiz_chars),
        difficulty = request.difficulty,
        difficulty_rule = quiz_difficulty(request.difficulty),
        example = QUIZ_EXAMPLE,
        rules = rules.join("\n"),
    );
    attach_source(Prompt::json(JSON_ONLY_SYSTEM, user), &request.source)
}

pub(crate) fn flashcard_prompt(request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
    let count = request.expected_count().unwrap_or(10);
    let difficulty = request.difficulty;
    let example = format!(
        r#"{{
  "flashcards": [
    {{
      "front": "What is photosynthesis?",
      "back": "The process by which plants turn sunlight into chemical energy.",
      "category": "Biology",
      "difficulty": "{d}"
    }},
    {{
      "front": "Photosynthesis equation",
      "back": "6CO2 + 6H2O + light -> C6H12O6 + 6O2",
      "category": "Biology",
      "difficulty": "{d}"
    }}
  ]
}}"#,
        d = difficulty
    );
    let mut rules = vec![
        format!("- Exactly {} flashcards", count),
        "- \"front\": the question or concept (short and clear)".to_string(),
        "- \"back\": the answer or explanation (detailed but concise)".to_string(),
        "- \"category\": the topic of the card".to_string(),
        format!("- \"difficulty\": \"{}\"", difficulty),
        "- Vary the card types: definitions, formulas, concepts, applications, examples".to_string(),
        "- Answers must be complete but easy to memorise".to_string(),
        GROUNDING_RULE.to_string(),
    ];
    push_optional_rules(&mut rules, request, budgets);
    rules.push("- No text before or after the JSON".to_string());

    let user = format!(
        "Create {count} flashcards based ONLY on this course.\n\n\
         COURSE:\n{course}\n\n\
         DIFFICULTY: {difficulty}\n{difficulty_rule}\n\n\
         The JSON must look EXACTLY like this:\n{example}\n\n\
         IMPORTANT RULES:\n{rules}\n",
        count = count,
        course = course_block(&request.source, budgets.flashcard_chars),
        difficulty = difficulty,
        difficulty_rule = flashcard_difficulty(difficulty),
        example = example,
        rules = rules.join("\n"),
    );
    attach_source(Prompt::json(JSON_ONLY_SYSTEM, user), &request.source)
}

pub(crate) fn extraction_prompt(request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
    let user = "Extract the text from this image. Do not add any information or comments.\n\
                Keep the reading order. You may mark headings with '#' and list items with '-'.\n\
                Reproduce formulas and numbers exactly. Answer with the text only.";
    match &request.source {
        SourceMaterial::Page(image) => Prompt::text(TRANSCRIBER_SYSTEM, user).with_image(image.clone()),
        SourceMaterial::Text(text) => Prompt::text(
            TRANSCRIBER_SYSTEM,
            format!(
                "Clean up this raw text extraction. Do not add any information or comments.\n\
                 Keep the reading order and mark headings with '#'.\n\nTEXT:\n{}",
                excerpt(text, budgets.extraction_chars)
            ),
        ),
    }
}

pub(crate) fn mastery_prompt(request: &GenerationRequest, budgets: &PromptBudgets) -> Prompt {
    let steps = request.expected_count().unwrap_or(4);
    let mut rules = vec![
        format!("- Exactly {} steps", steps),
        "- Step types: \"theory\", \"flashcards\", \"quiz\", \"practice\"".to_string(),
        "- Start with a theory step and end with a practice step".to_string(),
        "- Quiz questions have EXACTLY 4 options and a correct_index between 0 and 3".to_string(),
        "- Practice steps ask the student to explain, apply or summarise a concept in their own words"
            .to_string(),
        format!("- Flashcard difficulty: \"{}\"", request.difficulty),
        GROUNDING_RULE.to_string(),
    ];
    push_optional_rules(&mut rules, request, budgets);
    rules.push("- No text before or after the JSON".to_string());

    let user = format!(
        "Design an active learning session for this course content.\n\n\
         COURSE:\n{course}\n\n\
         Return JSON in this format:\n{example}\n\n\
         RULES:\n{rules}\n",
        course = course_block(&request.source, budgets.mastery_chars),
        example = MASTERY_EXAMPLE,
        rules = rules.join("\n"),
    );
    attach_source(Prompt::json(JSON_ONLY_SYSTEM, user), &request.source)
}
