use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "COREBRIDGE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Overrides for locating the runtime. Unset fields are discovered from the
/// start arguments.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuntimeSettings {
    pub hostfxr_path: Option<PathBuf>,
    pub runtime_config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_mirror_to_tracing")]
    pub mirror_to_tracing: bool,
}

fn default_mirror_to_tracing() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            mirror_to_tracing: default_mirror_to_tracing(),
        }
    }
}

impl BridgeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file named by [`CONFIG_ENV`], falling back to defaults.
    /// Configuration problems are logged, never fatal to hosting.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::from_file(Path::new(&path)) {
            Ok(config) => {
                tracing::debug!(path = ?path, "Loaded bridge config");
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring bridge config: {e}");
                Self::default()
            }
        }
    }
}
