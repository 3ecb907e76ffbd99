use anyhow::{Context, Result};
use memspi_decode::AddressingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub addressing_mode: AddressingMode,
    pub show_timestamp: bool,
    pub max_entries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addressing_mode: AddressingMode::default(),
            show_timestamp: false,
            max_entries: 10000,
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("memspi").join("settings.json"))
}

/// Load settings from `path`, or from the default location when none is
/// given. A missing default file yields the defaults; a missing explicit
/// file is an error.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => read(path),
        None => match default_path() {
            Some(path) if path.exists() => read(&path),
            _ => Ok(Settings::default()),
        },
    }
}

fn read(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read settings from {}", path.display()))?;
    let settings = serde_json::from_str(&text).with_context(|| format!("invalid settings file {}", path.display()))?;
    log::debug!("loaded settings from {}", path.display());
    Ok(settings)
}
