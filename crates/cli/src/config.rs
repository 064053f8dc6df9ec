//! Config file discovery and loading

use anyhow::{Context, Result};
use snapvault_core::BackupConfig;
use std::path::{Path, PathBuf};

const CONFIG_NAME: &str = "snapvault.toml";

/// Load the backup configuration.
///
/// An explicit path is used verbatim; otherwise `snapvault.toml` is
/// searched from the current directory upward.
pub fn load(explicit: Option<&Path>) -> Result<BackupConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => find_config()?,
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BackupConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    tracing::debug!(config = %path.display(), "loaded configuration");
    Ok(config)
}

fn find_config() -> Result<PathBuf> {
    let mut current = std::env::current_dir().context("Failed to get current directory")?;

    loop {
        let candidate = current.join(CONFIG_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!(
                "No {CONFIG_NAME} found; create one or pass --config"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_explicit_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.toml");
        std::fs::write(
            &path,
            r#"
            source_paths = ["/home/me/docs"]
            repository = "/backups/repo"
            schedule = "2h"
            "#,
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.schedule.as_deref(), Some("2h"));
        assert_eq!(config.repository, PathBuf::from("/backups/repo"));
    }

    #[test]
    fn invalid_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.toml");
        std::fs::write(&path, "source_paths = []\nrepository = \"/repo\"\n").unwrap();

        let err = load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("backup.toml"));
    }
}
