//! Project Configuration (.ternrc.toml)
//!
//! Handles project-level settings stored in `.ternrc.toml` at the project root.
//! This is the file `tern config set` writes to.

use crate::settings::Settings;
use crate::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// File name of the project configuration
pub const PROJECT_CONFIG_FILE: &str = ".ternrc.toml";

/// Project configuration bound to its file location
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    path: PathBuf,
    /// Settings read from the file
    pub settings: Settings,
}

impl ProjectConfig {
    /// Load the project configuration of `project_root`.
    ///
    /// Returns empty settings when the file does not exist yet.
    pub fn load(project_root: &Path) -> ConfigResult<Self> {
        let path = project_root.join(PROJECT_CONFIG_FILE);

        let settings = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let settings: Settings =
                    toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                        file: path.clone(),
                        error: e,
                    })?;
                settings.validate()?;
                settings
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(ConfigError::IoError(e)),
        };

        Ok(Self { path, settings })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and store a value
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        self.settings.set(key, value)
    }

    /// Write the configuration back to disk
    pub fn save(&self) -> ConfigResult<()> {
        let content = toml::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, content)?;
        tracing::info!(path = %self.path.display(), "wrote project config");
        Ok(())
    }
}
