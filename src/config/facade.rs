//! Loader facade: assembles the layered sources into one [`AdConfig`].

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::AdConfig;
use crate::error::ApiError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then user file, then workspace files, then `ADBATCH__*` env.
    pub fn load(workspace_root: &Path) -> Result<AdConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let settings = builder.add_source(merge_policy::environment()).build()?;

        let mut config: AdConfig = settings.try_deserialize()?;
        config.resolve_api_keys_from_env();
        debug!(
            workspace = %workspace_root.display(),
            providers = config.providers.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// One TOML file over the defaults; no other layers.
    pub fn load_from_file(path: &Path) -> Result<AdConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let settings = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?;

        let mut config: AdConfig = settings.try_deserialize()?;
        config.resolve_api_keys_from_env();
        Ok(config)
    }

    /// Built-in defaults with API keys from the environment.
    pub fn default() -> AdConfig {
        let mut config = AdConfig::default();
        config.resolve_api_keys_from_env();
        config
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
