//! Config loading facade: merges defaults, global file, workspace files and environment.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::StudiaConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): defaults, global file, workspace
    /// `studia.toml`, `config/{STUDIA_ENV}.toml`, `STUDIA__*` environment.
    pub fn load(workspace_root: &Path) -> Result<StudiaConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load from an explicit file (required) layered over defaults and environment.
    pub fn load_from_file(path: &Path) -> Result<StudiaConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix("STUDIA")
            .separator("__")
            .try_parsing(true)
    }
}
