//! Settings shared by the global and project configuration files

use crate::prefix::SemverRangePrefix;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A set of persisted settings.
///
/// Every field is optional so that layers can be merged: a value present in a
/// later layer replaces the value from an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Settings {
    /// Prefix used when neither `--exact`, `--tilde` nor `--caret` is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_semver_range_prefix: Option<String>,

    /// Location of the package cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_folder: Option<PathBuf>,

    /// Location of the local package registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_folder: Option<PathBuf>,

    /// Maximum number of packages resolved at the same time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_concurrency: Option<usize>,
}

impl Settings {
    /// Keys accepted by `config get` / `config set`
    pub const KEYS: [&'static str; 4] = [
        "defaultSemverRangePrefix",
        "cacheFolder",
        "registryFolder",
        "networkConcurrency",
    ];

    /// Validate every present value
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(prefix) = &self.default_semver_range_prefix {
            SemverRangePrefix::parse(prefix)?;
        }

        if self.network_concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "networkConcurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Merge another layer into this one.
    /// Other settings take precedence for non-None values
    pub fn merge(&mut self, other: &Settings) {
        if other.default_semver_range_prefix.is_some() {
            self.default_semver_range_prefix = other.default_semver_range_prefix.clone();
        }
        if other.cache_folder.is_some() {
            self.cache_folder = other.cache_folder.clone();
        }
        if other.registry_folder.is_some() {
            self.registry_folder = other.registry_folder.clone();
        }
        if other.network_concurrency.is_some() {
            self.network_concurrency = other.network_concurrency;
        }
    }

    /// Set a key from its textual form, validating the value first
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        match key {
            "defaultSemverRangePrefix" => {
                SemverRangePrefix::parse(value)?;
                self.default_semver_range_prefix = Some(value.to_string());
            }
            "cacheFolder" => self.cache_folder = Some(PathBuf::from(value)),
            "registryFolder" => self.registry_folder = Some(PathBuf::from(value)),
            "networkConcurrency" => {
                let parsed = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: "networkConcurrency".to_string(),
                        reason: format!("must be a positive integer, got '{}'", value),
                    })?;
                self.network_concurrency = Some(parsed);
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Read a key in its textual form
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        let value = match key {
            "defaultSemverRangePrefix" => self.default_semver_range_prefix.clone(),
            "cacheFolder" => self
                .cache_folder
                .as_ref()
                .map(|p| p.display().to_string()),
            "registryFolder" => self
                .registry_folder
                .as_ref()
                .map(|p| p.display().to_string()),
            "networkConcurrency" => self.network_concurrency.map(|n| n.to_string()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }
}
