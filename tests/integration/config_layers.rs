//! Configuration layering as seen from the CLI context.

use studia::cli::{Commands, ConfigCommands, OutputFormat, RunContext};
use studia::config::{ConfigLoader, ProviderType, WORKSPACE_CONFIG_FILE};
use tempfile::TempDir;

#[test]
fn environment_overrides_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        "[provider]\nprovider_type = \"anthropic\"\nmodel = \"claude-3-haiku\"\n\n[pipeline]\ncall_timeout_secs = 30\n",
    )
    .unwrap();

    std::env::set_var("STUDIA__PIPELINE__CALL_TIMEOUT_SECS", "45");
    let loaded = ConfigLoader::load_from_file(&path);
    std::env::remove_var("STUDIA__PIPELINE__CALL_TIMEOUT_SECS");

    let config = loaded.unwrap();
    assert_eq!(config.provider.provider_type, ProviderType::Anthropic);
    assert_eq!(config.pipeline.call_timeout_secs, 45);
}

#[test]
fn config_validate_reports_bad_values() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(WORKSPACE_CONFIG_FILE),
        "[pipeline]\nquality_threshold = 150\n",
    )
    .unwrap();

    let context = RunContext::new(
        dir.path().to_path_buf(),
        Some(dir.path().join(WORKSPACE_CONFIG_FILE)),
    )
    .unwrap();
    let output = context
        .execute(
            &Commands::Config {
                command: ConfigCommands::Validate,
            },
            OutputFormat::Text,
        )
        .unwrap();
    assert!(output.contains("quality_threshold"));
}

#[test]
fn missing_api_key_is_reported_before_any_request() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("studia.toml");
    std::fs::write(
        &path,
        "[provider]\nprovider_type = \"openai\"\napi_key_env = \"STUDIA_TEST_UNSET_KEY\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "Mitochondria produce ATP for the cell.").unwrap();

    let context = RunContext::new(dir.path().to_path_buf(), Some(path)).unwrap();
    let err = context
        .execute(
            &Commands::Flashcards {
                text_file: "notes.txt".into(),
                options: studia::cli::GenerationArgs {
                    count: None,
                    difficulty: Default::default(),
                    subject: None,
                },
            },
            OutputFormat::Text,
        )
        .unwrap_err();
    assert!(studia::cli::map_error(&err).contains("hint"));
}
