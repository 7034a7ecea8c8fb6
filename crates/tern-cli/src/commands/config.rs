//! Settings commands (tern config set / get)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tern_config::{Config, ConfigLoader, ProjectConfig};
use tern_package::Project;

/// Settings live at the project root; outside a project, in `dir` itself
fn settings_root(dir: &Path) -> Result<PathBuf> {
    match Project::find(dir) {
        Ok(project) => Ok(project.root().to_path_buf()),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "no project found, using directory");
            dir.canonicalize()
                .with_context(|| format!("Failed to access {}", dir.display()))
        }
    }
}

/// Validate `value` and persist it in the project configuration
pub fn set(dir: &Path, key: &str, value: &str) -> Result<()> {
    let root = settings_root(dir)?;
    let mut project_config = ProjectConfig::load(&root).context("Failed to read project configuration")?;
    project_config.set(key, value)?;
    project_config
        .save()
        .with_context(|| format!("Failed to write {}", project_config.path().display()))?;
    Ok(())
}

/// Print the value in effect after every layer is merged
pub fn get(dir: &Path, key: &str) -> Result<()> {
    let root = settings_root(dir)?;
    let config = ConfigLoader::new()
        .load(&root)
        .context("Failed to load configuration")?;
    if let Some(value) = effective_value(&config, key)? {
        println!("{}", value);
    }
    Ok(())
}

fn effective_value(config: &Config, key: &str) -> Result<Option<String>> {
    // Rejects unknown keys
    let stored = config.settings.get(key)?;
    let value = match key {
        "defaultSemverRangePrefix" => Some(config.default_semver_range_prefix().as_str().to_string()),
        "cacheFolder" => Some(config.cache_folder().display().to_string()),
        "registryFolder" => config.registry_folder().map(|p| p.display().to_string()),
        "networkConcurrency" => Some(config.network_concurrency().to_string()),
        _ => stored,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_effective_defaults() {
        let config = Config::for_project("/work/app");
        assert_eq!(
            effective_value(&config, "defaultSemverRangePrefix").unwrap(),
            Some("^".to_string())
        );
        assert_eq!(
            effective_value(&config, "networkConcurrency").unwrap(),
            Some("8".to_string())
        );
        assert_eq!(effective_value(&config, "registryFolder").unwrap(), None);
        assert!(effective_value(&config, "colour").is_err());
    }

    #[test]
    fn test_set_writes_at_project_root() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("package.json"),
            r#"{ "name": "root", "workspaces": ["packages/*"] }"#,
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("packages/a")).unwrap();
        fs::write(temp.path().join("packages/a/package.json"), r#"{ "name": "a" }"#).unwrap();

        set(&temp.path().join("packages/a"), "defaultSemverRangePrefix", "~").unwrap();

        let stored = ProjectConfig::load(temp.path()).unwrap();
        assert_eq!(stored.settings.default_semver_range_prefix.as_deref(), Some("~"));
        assert!(!temp.path().join("packages/a/.ternrc.toml").exists());
    }

    #[test]
    fn test_set_rejects_invalid_prefix() {
        let temp = TempDir::new().unwrap();
        assert!(set(temp.path(), "defaultSemverRangePrefix", ">=").is_err());
        assert!(!temp.path().join(".ternrc.toml").exists());
    }
}
