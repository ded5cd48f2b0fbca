//! Request-side types shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested difficulty of the generated material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!(
                "Invalid difficulty: {} (must be 'easy', 'medium' or 'hard')",
                other
            )),
        }
    }
}

/// Course subject. Only selects a prompt template variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Mathematics,
    Sciences,
    History,
    Languages,
    Programming,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mathematics",
            Subject::Sciences => "sciences",
            Subject::History => "history",
            Subject::Languages => "languages",
            Subject::Programming => "programming",
        }
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mathematics" | "math" | "maths" => Ok(Subject::Mathematics),
            "sciences" | "science" => Ok(Subject::Sciences),
            "history" => Ok(Subject::History),
            "languages" | "language" => Ok(Subject::Languages),
            "programming" | "code" => Ok(Subject::Programming),
            other => Err(format!("Unknown subject: {}", other)),
        }
    }
}

/// The kind of artifact a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Quiz,
    Flashcards,
    ExtractedText,
    MasteryModule,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Quiz => "quiz",
            ArtifactKind::Flashcards => "flashcards",
            ArtifactKind::ExtractedText => "extracted_text",
            ArtifactKind::MasteryModule => "mastery_module",
        }
    }

    /// Item count used when the request leaves `count` unset.
    pub fn default_count(&self) -> Option<usize> {
        match self {
            ArtifactKind::Quiz => Some(5),
            ArtifactKind::Flashcards => Some(10),
            ArtifactKind::ExtractedText => None,
            ArtifactKind::MasteryModule => Some(4),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A photographed course page, base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub media_type: String,
    pub data_base64: String,
}

impl PageImage {
    pub fn new(media_type: impl Into<String>, data_base64: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data_base64: data_base64.into(),
        }
    }

    /// Accepts either a `data:<mime>;base64,<payload>` URI or a bare base64 payload.
    pub fn from_data_uri(input: &str) -> Self {
        match input.split_once("base64,") {
            Some((prefix, payload)) => {
                let media_type = prefix
                    .strip_prefix("data:")
                    .map(|rest| rest.trim_end_matches(';'))
                    .filter(|mime| !mime.is_empty())
                    .unwrap_or("image/jpeg");
                Self::new(media_type, payload)
            }
            None => Self::new("image/jpeg", input),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data_base64)
    }

    /// Decoded size estimated from the base64 length.
    pub fn approx_size_bytes(&self) -> usize {
        self.data_base64.len() * 3 / 4
    }
}

/// Input the pipeline derives an artifact from. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum SourceMaterial {
    Text(String),
    Page(PageImage),
}

impl SourceMaterial {
    pub fn text(text: impl Into<String>) -> Self {
        SourceMaterial::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SourceMaterial::Text(text) => Some(text),
            SourceMaterial::Page(_) => None,
        }
    }

    pub fn page(&self) -> Option<&PageImage> {
        match self {
            SourceMaterial::Text(_) => None,
            SourceMaterial::Page(image) => Some(image),
        }
    }

    /// Length used for logging; source content itself is never logged.
    pub fn len_hint(&self) -> usize {
        match self {
            SourceMaterial::Text(text) => text.chars().count(),
            SourceMaterial::Page(image) => image.approx_size_bytes(),
        }
    }
}

/// One pipeline invocation's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: ArtifactKind,
    pub source: SourceMaterial,
    pub count: Option<usize>,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub subject: Option<Subject>,
}

impl GenerationRequest {
    pub fn new(kind: ArtifactKind, source: SourceMaterial) -> Self {
        Self {
            kind,
            source,
            count: None,
            difficulty: Difficulty::default(),
            subject: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_subject(mut self, subject: Option<Subject>) -> Self {
        self.subject = subject;
        self
    }

    /// Requested item count, falling back to the kind's default.
    pub fn expected_count(&self) -> Option<usize> {
        self.count.or_else(|| self.kind.default_count())
    }
}
