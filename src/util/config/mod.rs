//! Catena configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. Explicit path passed to `load_config`
//! 2. CATENA_CONFIG environment variable
//! 3. User-level ($XDG_CONFIG_HOME/catena/config.toml or ~/.config/catena/config.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use catena::util::config::EngineConfig;
//!
//! let config: EngineConfig = toml::from_str("[engine]\nmax_depth = 64").unwrap();
//! assert_eq!(config.engine.max_depth, 64);
//! ```

use crate::util::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "CATENA_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Stack machine settings
    #[serde(default)]
    pub engine: EngineSection,
    /// Logger settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Stack machine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Maximum number of active invocation frames
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// System id recorded for commands without a source locator
    #[serde(default = "default_unknown_location")]
    pub unknown_location: String,
    /// Warn when a scope context is dropped while still holding components
    #[serde(default = "default_warn_unreleased")]
    pub warn_unreleased: bool,
}

fn default_max_depth() -> usize {
    1024
}

fn default_unknown_location() -> String {
    "UNKNOWN_LOCATION".to_string()
}

fn default_warn_unreleased() -> bool {
    true
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            unknown_location: default_unknown_location(),
            warn_unreleased: default_warn_unreleased(),
        }
    }
}

/// Logger settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Minimum level
    #[serde(default)]
    pub level: LogLevel,
    /// `EnvFilter` directives; overrides `level` when set
    #[serde(default)]
    pub filter: Option<String>,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("catena"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("catena"));
    }

    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("catena"));
    }

    None
}

/// Get the user config file path (~/.config/catena/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Load configuration following the precedence above.
///
/// Missing files yield defaults; unreadable or malformed files are errors.
pub fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return load_config_file(Path::new(&path));
    }

    match get_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(EngineConfig::default()),
    }
}

/// Load one file; a missing file yields defaults.
pub fn load_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config(
    config: &EngineConfig,
    path: &Path,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests;
