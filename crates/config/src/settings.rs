// User settings, read from settings.toml

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use sheetmerge_io::ReadOptions;
use sheetmerge_merge::{ExportConfig, MergeConfig};

pub const APP_DIR: &str = "sheetmerge";
pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// All tunables, each section defaulted when absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Batch read pool size. `None` uses every available core.
    pub workers: Option<usize>,
    pub reader: ReadOptions,
    pub merge: MergeConfig,
    pub export: ExportConfig,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter used when neither `RUST_LOG` nor `--verbose` is set.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

impl Settings {
    /// Default settings file location: `<config dir>/sheetmerge/settings.toml`.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    pub fn from_toml(input: &str) -> Result<Self, String> {
        let settings: Settings = toml::from_str(input).map_err(|e| e.to_string())?;
        settings.merge.validate().map_err(|e| e.to_string())?;
        if settings.workers == Some(0) {
            return Err("workers must be at least 1".to_string());
        }
        Ok(settings)
    }

    /// Load settings from `explicit`, or from [`Settings::config_path`].
    ///
    /// A missing default file yields the defaults. A missing explicit file
    /// is an error: the user asked for it by name.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => {
                let path = Self::config_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                Self::load_file(&path)
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|message| SettingsError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}
