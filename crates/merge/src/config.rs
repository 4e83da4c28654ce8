use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Name of the synthetic provenance column unless configured otherwise.
pub const DEFAULT_SOURCE_COLUMN: &str = "source";

/// Estimated exports above this size carry a warning (100 MiB).
pub const DEFAULT_LARGE_EXPORT_BYTES: usize = 100 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Every table must have exactly the same column sequence.
    #[default]
    Strict,
    /// Keep only the columns all tables share, after name normalization.
    Intersection,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Intersection => write!(f, "intersection"),
        }
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "identical" => Ok(Self::Strict),
            "intersection" | "common" => Ok(Self::Intersection),
            other => Err(format!("unknown merge mode '{other}' (expected strict or intersection)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge + Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub mode: MergeMode,
    pub source_column: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            mode: MergeMode::default(),
            source_column: DEFAULT_SOURCE_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// File-name stem used when the caller does not supply one.
    pub default_file_stem: String,
    pub large_export_warning_bytes: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_file_stem: "merged_data".to_string(),
            large_export_warning_bytes: DEFAULT_LARGE_EXPORT_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl MergeConfig {
    pub fn from_toml(input: &str) -> Result<Self, MergeError> {
        let config: MergeConfig =
            toml::from_str(input).map_err(|e| MergeError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.source_column.trim().is_empty() {
            return Err(MergeError::ConfigParse("source_column must not be empty".into()));
        }
        Ok(())
    }
}
