//! Assembles the layered configuration.

use super::merge::merge_policy::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::ClusterMakerConfig;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): defaults, global file, `config/config.toml`,
    /// `config/{CLUSTERMAKER_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<ClusterMakerConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: ClusterMakerConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load defaults plus one explicit file, skipping the other sources.
    pub fn load_from_file(path: &Path) -> Result<ClusterMakerConfig, ConfigError> {
        builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()
    }
}
