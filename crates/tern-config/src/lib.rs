//! Tern Configuration System
//!
//! Provides the persisted settings consumed by the package manager core:
//! - Global user configuration (~/.tern/config.toml)
//! - Project configuration (.ternrc.toml at the project root)
//! - Environment overrides (TERN_*)
//!
//! # Configuration Hierarchy
//!
//! Settings are merged in the following order (later overrides earlier):
//! 1. Global config (~/.tern/config.toml)
//! 2. Project config (./.ternrc.toml)
//! 3. Environment variables (TERN_*)
//! 4. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use tern_config::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::new().load(Path::new(".")).unwrap();
//! println!("{}", config.default_semver_range_prefix().as_str());
//! ```

pub mod global;
pub mod loader;
pub mod prefix;
pub mod project;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use prefix::SemverRangePrefix;
pub use project::ProjectConfig;
pub use settings::Settings;
