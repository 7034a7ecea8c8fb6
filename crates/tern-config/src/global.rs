//! Global Configuration (~/.tern/config.toml)
//!
//! Handles user-level settings stored in `~/.tern/config.toml`.

use crate::settings::Settings;
use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Get the global configuration directory (~/.tern)
pub fn global_config_dir() -> ConfigResult<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(home.join(".tern"))
}

/// Get the global config file path (~/.tern/config.toml)
pub fn global_config_path() -> ConfigResult<PathBuf> {
    Ok(global_config_dir()?.join("config.toml"))
}

/// Load global settings from a file.
///
/// A missing file is not an error: global settings are optional.
pub fn load_global_settings(path: &Path) -> ConfigResult<Settings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no global config");
            return Ok(Settings::default());
        }
        Err(e) => return Err(ConfigError::IoError(e)),
    };

    let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
        file: path.to_path_buf(),
        error: e,
    })?;

    settings.validate()?;
    Ok(settings)
}
