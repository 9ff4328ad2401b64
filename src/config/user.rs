//! User configuration loading for editlens.
//!
//! User config location: $XDG_CONFIG_HOME/editlens/editlens.toml
//! Fallback: the platform config directory (e.g. ~/.config/editlens/editlens.toml)

use std::path::PathBuf;

use thiserror::Error;

use super::SettingsLayer;

#[derive(Debug, Error)]
pub enum UserConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub type UserConfigResult<T> = Result<T, UserConfigError>;

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/editlens/editlens.toml
/// 2. Otherwise: the platform config dir reported by `dirs`
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return Some(PathBuf::from(xdg_config).join("editlens").join("editlens.toml"));
    }

    dirs::config_dir().map(|dir| dir.join("editlens").join("editlens.toml"))
}

/// Load the user configuration layer.
///
/// Returns `Ok(None)` when no user config file exists.
pub fn load_user_config() -> UserConfigResult<Option<SettingsLayer>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| UserConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| UserConfigError::Parse { path, source })
}
