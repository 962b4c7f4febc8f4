//! Workspace config files: config/config.toml, then config/{SHOTLIST_ENV}.toml
//! when an environment is selected.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Selected deployment environment, if any.
pub fn environment_name() -> Option<String> {
    std::env::var("SHOTLIST_ENV")
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Existing workspace config files in override order.
pub fn workspace_config_files(workspace_root: &Path, env_name: Option<&str>) -> Vec<PathBuf> {
    let config_dir = workspace_root.join("config");
    std::iter::once(config_dir.join("config.toml"))
        .chain(env_name.map(|name| config_dir.join(format!("{}.toml", name))))
        .filter(|path| path.is_file())
        .collect()
}

pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = environment_name();
    for path in workspace_config_files(workspace_root, env_name.as_deref()) {
        debug!(config_path = %path.display(), "Layering workspace configuration");
        builder = builder.add_source(File::from(path).required(false));
    }
    Ok(builder)
}
