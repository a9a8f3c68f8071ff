//! Cache location and the optional config file.
//!
//! The environment is read once at startup into [`Environment`] and the
//! result of resolution, [`Settings`], is passed explicitly to the lock and
//! the cache. Nothing else in the crate looks at environment variables.
//!
//! The config file is optional and holds a single key, `cache_file`.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::SetupError;

/// Directory name the feed reader uses under the XDG base directories.
const READER_SUBDIR_XDG: &str = "newsboat";
/// Dot-directory the feed reader uses in `$HOME` when XDG is not in use.
const READER_DOT_DIR: &str = ".newsboat";
const CACHE_FILENAME: &str = "cache.db";

const CONFIG_SUBDIR: &str = "move-url";
const CONFIG_FILENAME: &str = "config.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Environment
// ============================================================================

/// Base directories that decide default paths, captured once at startup.
///
/// `config_home` and `data_home` are the XDG config and data homes, already
/// resolved (environment override or the `$HOME` fallback). Tests build this
/// directly instead of touching the process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub home: Option<PathBuf>,
    pub config_home: Option<PathBuf>,
    pub data_home: Option<PathBuf>,
}

impl Environment {
    #[cfg(unix)]
    pub fn from_process() -> Self {
        let (config_home, data_home) = match xdg::BaseDirectories::new() {
            Ok(base) => (Some(base.get_config_home()), Some(base.get_data_home())),
            Err(e) => {
                tracing::debug!(error = %e, "No XDG base directories available");
                (None, None)
            }
        };
        Self {
            home: dirs::home_dir(),
            config_home,
            data_home,
        }
    }

    #[cfg(not(unix))]
    pub fn from_process() -> Self {
        Self {
            home: dirs::home_dir(),
            config_home: dirs::config_dir(),
            data_home: dirs::data_dir(),
        }
    }

    /// Where the feed reader keeps its cache by default.
    ///
    /// The reader switches to XDG directories only once its XDG config
    /// directory exists; otherwise it lives in `~/.newsboat`.
    pub fn default_cache_path(&self) -> Option<PathBuf> {
        if let (Some(config_home), Some(data_home)) = (&self.config_home, &self.data_home) {
            if config_home.join(READER_SUBDIR_XDG).is_dir() {
                return Some(data_home.join(READER_SUBDIR_XDG).join(CACHE_FILENAME));
            }
        }
        self.home
            .as_ref()
            .map(|h| h.join(READER_DOT_DIR).join(CACHE_FILENAME))
    }

    /// Default location of this tool's own config file.
    pub fn config_file(&self) -> Option<PathBuf> {
        self.config_home
            .as_ref()
            .map(|c| c.join(CONFIG_SUBDIR).join(CONFIG_FILENAME))
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache database to operate on when `--cache-file` is not given.
    pub cache_file: Option<PathBuf>,
}

impl Config {
    /// Read `path`; a missing file means "no overrides".
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), cache_file = ?config.cache_file, "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Resolved run settings shared by the lock and the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_path: PathBuf,
}

impl Settings {
    /// Pick the cache path: command-line flag, then config file, then the
    /// feed reader's default location.
    pub fn resolve(
        cache_flag: Option<PathBuf>,
        config: &Config,
        env: &Environment,
    ) -> Result<Self, SetupError> {
        let cache_path = cache_flag
            .or_else(|| config.cache_file.clone())
            .or_else(|| env.default_cache_path())
            .ok_or(SetupError::NoCachePath)?;
        tracing::debug!(path = %cache_path.display(), "Resolved cache path");
        Ok(Self { cache_path })
    }
}

// ============================================================================
// Tests
// ============================================================================
