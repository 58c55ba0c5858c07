use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compile::EngineLimits;
use crate::error::{Result, StencilError};

/// User-level configuration loaded from `~/.config/stencil/config.toml`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub engine: EngineLimits,

    /// Render worker threads.
    pub jobs: Option<usize>,

    pub timeout_secs: Option<u64>,

    /// Folders searched before a catalog's own templates, for local overrides.
    #[serde(default)]
    pub template_overrides: Vec<PathBuf>,
}

/// Get the path to the user config file.
fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stencil").join("config.toml"))
}

/// Load user configuration from the XDG config directory.
///
/// Returns `Ok(None)` if the config file does not exist.
pub fn load_user_config() -> Result<Option<UserConfig>> {
    match config_path() {
        Some(path) => load_user_config_from(&path),
        None => Ok(None),
    }
}

pub fn load_user_config_from(path: &Path) -> Result<Option<UserConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| StencilError::Io {
        context: format!("reading user config {}", path.display()),
        source: e,
    })?;

    let config: UserConfig =
        toml::from_str(&content).map_err(|e| StencilError::UserConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    tracing::debug!(path = %path.display(), "loaded user config");
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_user_config() {
        let toml_str = r#"
jobs = 4
timeout_secs = 30
template_overrides = ["/home/me/stencil-overrides"]

[engine]
max_operations = 1000
"#;
        let config: UserConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.engine.max_operations, 1000);
        assert_eq!(
            config.engine.max_call_levels,
            EngineLimits::default().max_call_levels
        );
        assert_eq!(config.template_overrides.len(), 1);
    }

    #[test]
    fn parse_empty_config() {
        let config: UserConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine, EngineLimits::default());
        assert!(config.jobs.is_none());
    }

    #[test]
    fn malformed_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid [[ toml").unwrap();
        assert!(matches!(
            load_user_config_from(&path),
            Err(StencilError::UserConfigParse { .. })
        ));
    }

    #[test]
    fn missing_config_is_none() {
        let result = load_user_config_from(Path::new("/nonexistent/stencil/config.toml"));
        assert!(result.unwrap().is_none());
    }
}
