//! Studia: self-refining generation of study material
//!
//! Course text or photographed pages go in; quizzes, flashcards, page
//! transcriptions and mastery modules come out. Every artifact passes through
//! a generate, validate and (when below the quality gate) refine pipeline
//! before it is returned.

pub mod artifact;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod refiner;
pub mod schema;
pub mod strategy;
pub mod study;
pub mod types;
pub mod validator;

pub use cancel::CancellationToken;
pub use error::{PipelineError, ProviderError};
pub use pipeline::{Pipeline, PipelineOutput, RefinementMetadata, RefinementOutcome};
pub use study::StudyService;
