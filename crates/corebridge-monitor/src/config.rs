use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// How received frames are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Re-emit through `tracing` at the frame's level.
    #[default]
    Text,
    /// One JSON frame per line on stdout.
    Json,
}

#[derive(Debug, Default, PartialEq, Deserialize)]
pub struct MonitorConfig {
    pub pipe: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// `<config dir>/corebridge/monitor.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("corebridge").join("monitor.toml"))
    }

    /// An explicit path must exist. The default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}
