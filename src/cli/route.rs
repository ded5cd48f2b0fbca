//! CLI route: loads configuration, wires the study service and dispatches commands.

use crate::cancel::CancellationToken;
use crate::cli::parse::{Commands, ConfigCommands, GenerationArgs, OutputFormat, QuizSource};
use crate::cli::presentation::{
    format_config_validation, format_document_text, format_evaluation_text, format_json,
    format_record_text, format_validation_errors,
};
use crate::config::{ConfigLoader, StudiaConfig};
use crate::error::PipelineError;
use crate::generation::{GenerationClient, ProviderGenerationClient};
use crate::provider::ProviderFactory;
use crate::study::{StudyOptions, StudyRecord, StudyService};
use crate::types::PageImage;
use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace and resolved configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: StudiaConfig,
}

impl RunContext {
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigLoader::load(&workspace_root).context("Failed to load configuration")?,
        };
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &StudiaConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands, format: OutputFormat) -> anyhow::Result<String> {
        match command {
            Commands::Config { command } => self.handle_config(command),
            Commands::Quiz { source, options } => {
                let record = match source_input(source)? {
                    QuizInput::Text(path) => {
                        let text = read_text(&self.resolve(path))?;
                        self.run_study(|service, token| async move {
                            service.quiz_from_text(&text, study_options(options), &token).await
                        })?
                    }
                    QuizInput::Image(path) => {
                        let image = read_page_image(&self.resolve(path))?;
                        self.run_study(|service, token| async move {
                            service.quiz_from_image(image, study_options(options), &token).await
                        })?
                    }
                };
                render_record(&record, format)
            }
            Commands::Flashcards { text_file, options } => {
                let text = read_text(&self.resolve(text_file))?;
                let record = self.run_study(|service, token| async move {
                    service.flashcards(&text, study_options(options), &token).await
                })?;
                render_record(&record, format)
            }
            Commands::Mastery { text_file, options } => {
                let text = read_text(&self.resolve(text_file))?;
                let record = self.run_study(|service, token| async move {
                    service.mastery_module(&text, study_options(options), &token).await
                })?;
                render_record(&record, format)
            }
            Commands::Extract { images } => {
                let pages = images
                    .iter()
                    .map(|path| read_page_image(&self.resolve(path)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let document = self.run_study(|service, token| async move {
                    service.extract_pages(pages, &token).await
                })?;
                match format {
                    OutputFormat::Json => Ok(format_json(&document)?),
                    OutputFormat::Text => Ok(format_document_text(&document)),
                }
            }
            Commands::Evaluate {
                instruction,
                answer,
                context_file,
            } => {
                let context = read_text(&self.resolve(context_file))?;
                let evaluation = self.run_study(|service, token| async move {
                    service
                        .evaluate_answer(instruction, answer, &context, &token)
                        .await
                })?;
                match format {
                    OutputFormat::Json => Ok(format_json(&evaluation)?),
                    OutputFormat::Text => Ok(format_evaluation_text(&evaluation)),
                }
            }
        }
    }

    fn handle_config(&self, command: &ConfigCommands) -> anyhow::Result<String> {
        match command {
            ConfigCommands::Show => toml::to_string(&self.config.redacted())
                .context("Failed to render configuration"),
            ConfigCommands::Validate => Ok(format_config_validation(&self.config)),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn build_service(&self) -> anyhow::Result<StudyService> {
        if let Err(errors) = self.config.validate() {
            bail!(PipelineError::ConfigError(format_validation_errors(&errors)));
        }
        let provider = self
            .config
            .provider
            .to_model_provider()
            .map_err(PipelineError::from)?;
        let provider_client =
            ProviderFactory::create_client(&provider).map_err(PipelineError::from)?;
        let client: Arc<dyn GenerationClient> = Arc::new(ProviderGenerationClient::new(
            provider_client,
            self.config.provider.completion_options(),
        ));
        info!(
            provider = %self.config.provider.provider_type,
            model = %self.config.provider.model,
            "Study service ready"
        );
        Ok(StudyService::from_client(
            client,
            self.config.pipeline_settings(),
            self.config.pipeline.extraction_concurrency,
        ))
    }

    /// Run one service call on a fresh runtime; Ctrl-C cancels it.
    fn run_study<T, F, Fut>(&self, call: F) -> anyhow::Result<T>
    where
        F: FnOnce(Arc<StudyService>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let service = Arc::new(self.build_service()?);
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let token = CancellationToken::new();
        let interrupt = token.clone();

        let result = runtime.block_on(async move {
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling");
                    interrupt.cancel();
                }
            });
            call(service, token).await
        });
        Ok(result?)
    }
}

enum QuizInput<'a> {
    Text(&'a Path),
    Image(&'a Path),
}

fn source_input(source: &QuizSource) -> anyhow::Result<QuizInput<'_>> {
    match (&source.text_file, &source.image) {
        (Some(path), None) => Ok(QuizInput::Text(path)),
        (None, Some(path)) => Ok(QuizInput::Image(path)),
        _ => bail!(PipelineError::InvalidRequest(
            "Provide exactly one of --text-file or --image".to_string()
        )),
    }
}

fn study_options(args: &GenerationArgs) -> StudyOptions {
    StudyOptions {
        count: args.count,
        difficulty: args.difficulty,
        subject: args.subject,
    }
}

fn render_record(record: &StudyRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(format_json(record)?),
        OutputFormat::Text => Ok(format_record_text(record)),
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load a page photo: raw image bytes, or a text file holding a data URI.
pub fn read_page_image(path: &Path) -> anyhow::Result<PageImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.starts_with(b"data:") {
        let text = String::from_utf8(bytes)
            .with_context(|| format!("{} is not a valid data URI", path.display()))?;
        return Ok(PageImage::from_data_uri(text.trim()));
    }
    Ok(PageImage::new(media_type_for(path), STANDARD.encode(&bytes)))
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
