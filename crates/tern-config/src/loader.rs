//! Configuration Loader
//!
//! Handles loading and merging settings from multiple sources with proper precedence.

use crate::global::{global_config_path, load_global_settings};
use crate::prefix::SemverRangePrefix;
use crate::project::ProjectConfig;
use crate::settings::Settings;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Default number of packages resolved at the same time
pub const DEFAULT_NETWORK_CONCURRENCY: usize = 8;

/// Environment variable overriding the cache location
pub const ENV_CACHE_FOLDER: &str = "TERN_CACHE_FOLDER";
/// Environment variable overriding the registry location
pub const ENV_REGISTRY_FOLDER: &str = "TERN_REGISTRY_FOLDER";
/// Environment variable overriding the default range prefix
pub const ENV_DEFAULT_SEMVER_RANGE_PREFIX: &str = "TERN_DEFAULT_SEMVER_RANGE_PREFIX";
/// Environment variable overriding the resolution concurrency
pub const ENV_NETWORK_CONCURRENCY: &str = "TERN_NETWORK_CONCURRENCY";

/// Configuration loader
///
/// Loads settings from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.tern/config.toml) - lowest priority
/// 2. Project config (./.ternrc.toml) - overrides global
/// 3. Environment variables (TERN_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Explicit global config path; `None` means ~/.tern/config.toml
    global_config_path: Option<PathBuf>,
}

/// Merged configuration, read once per invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Effective settings after merging every layer
    pub settings: Settings,

    /// Project root directory the settings were loaded for
    pub project_root: PathBuf,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of ~/.tern/config.toml
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load the merged configuration for the project rooted at `project_root`
    pub fn load(&self, project_root: &Path) -> ConfigResult<Config> {
        let mut settings = self.load_global()?;

        let project = ProjectConfig::load(project_root)?;
        settings.merge(&project.settings);

        settings.merge(&Self::env_overrides()?);
        settings.validate()?;

        tracing::debug!(root = %project_root.display(), ?settings, "loaded configuration");

        Ok(Config {
            settings,
            project_root: project_root.to_path_buf(),
        })
    }

    fn load_global(&self) -> ConfigResult<Settings> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match global_config_path() {
                Ok(path) => path,
                // No home directory means no global layer
                Err(ConfigError::HomeNotFound) => return Ok(Settings::default()),
                Err(e) => return Err(e),
            },
        };

        load_global_settings(&path)
    }

    /// Collect overrides from TERN_* environment variables
    fn env_overrides() -> ConfigResult<Settings> {
        let mut settings = Settings::default();

        if let Ok(folder) = env::var(ENV_CACHE_FOLDER) {
            if !folder.is_empty() {
                settings.cache_folder = Some(PathBuf::from(folder));
            }
        }

        if let Ok(folder) = env::var(ENV_REGISTRY_FOLDER) {
            if !folder.is_empty() {
                settings.registry_folder = Some(PathBuf::from(folder));
            }
        }

        if let Ok(prefix) = env::var(ENV_DEFAULT_SEMVER_RANGE_PREFIX) {
            settings.set("defaultSemverRangePrefix", &prefix)?;
        }

        if let Ok(concurrency) = env::var(ENV_NETWORK_CONCURRENCY) {
            settings.set("networkConcurrency", &concurrency)?;
        }

        Ok(settings)
    }
}

impl Config {
    /// Configuration with no persisted settings at all
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        Self {
            settings: Settings::default(),
            project_root: project_root.into(),
        }
    }

    /// The persisted prefix, if one was configured
    pub fn configured_semver_range_prefix(&self) -> Option<SemverRangePrefix> {
        self.settings
            .default_semver_range_prefix
            .as_deref()
            .and_then(|prefix| SemverRangePrefix::parse(prefix).ok())
    }

    /// The prefix to apply by default (configured value, or `^`)
    pub fn default_semver_range_prefix(&self) -> SemverRangePrefix {
        self.configured_semver_range_prefix().unwrap_or_default()
    }

    /// Cache location; relative settings resolve against the project root
    pub fn cache_folder(&self) -> PathBuf {
        match &self.settings.cache_folder {
            Some(folder) => self.resolve_path(folder),
            None => self.project_root.join(".tern").join("cache"),
        }
    }

    /// Local registry location, if configured
    pub fn registry_folder(&self) -> Option<PathBuf> {
        self.settings
            .registry_folder
            .as_ref()
            .map(|folder| self.resolve_path(folder))
    }

    /// Size of the resolution worker pool
    pub fn network_concurrency(&self) -> usize {
        self.settings
            .network_concurrency
            .unwrap_or(DEFAULT_NETWORK_CONCURRENCY)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
