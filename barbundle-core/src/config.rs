//! Serializable ingestion configuration.
//!
//! A bundle is described by a TOML file:
//!
//! ```toml
//! exchange = "YAHOO"
//! frequency = "daily"
//!
//! [source]
//! kind = "directory"
//! dir = "~/.barbundle/csv/yahoo"
//! dir_env = "YAHOO_CSVDIR"
//! index_column = "Date"
//!
//! [column_mapping]
//! Open = "open"
//! ```

use crate::data::filter::{SeriesFilter, SessionFilter, ValidBarsFilter, WeekdayCalendar};
use crate::data::normalize::ColumnMapping;
use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Bar granularity of the ingested series. Selects the bar writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarFrequency {
    #[default]
    Daily,
    Minute,
}

impl BarFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarFrequency::Daily => "daily",
            BarFrequency::Minute => "minute",
        }
    }
}

impl fmt::Display for BarFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk format of per-symbol files in a directory source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    #[default]
    Csv,
    Parquet,
}

impl FileFormat {
    /// File extension (without the dot) of one symbol's file.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }
}

fn default_index_column() -> String {
    "date".to_string()
}

/// Where symbols and their series come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// One file per symbol in a directory, named `<symbol>.<ext>`.
    Directory {
        /// Fallback directory when the override variable is unset or invalid.
        #[serde(default)]
        dir: Option<PathBuf>,
        /// Environment variable holding a directory override.
        #[serde(default)]
        dir_env: Option<String>,
        /// Column holding the bar timestamp.
        #[serde(default = "default_index_column")]
        index_column: String,
        #[serde(default)]
        format: FileFormat,
    },
    /// Configured symbols plus a comma-separated environment list, fetched
    /// through a downloader supplied in code.
    SymbolList {
        #[serde(default)]
        symbols: Vec<String>,
        #[serde(default)]
        symbols_env: Option<String>,
    },
}

/// Built-in series filters applied after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConfig {
    /// Drop bars that violate OHLC sanity.
    ValidBars,
    /// Keep only Monday–Friday sessions.
    Sessions,
}

impl FilterConfig {
    pub fn build(&self) -> Box<dyn SeriesFilter> {
        match self {
            FilterConfig::ValidBars => Box::new(ValidBarsFilter),
            FilterConfig::Sessions => Box::new(SessionFilter::new(WeekdayCalendar)),
        }
    }
}

/// Complete, immutable description of one bundle's ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Exchange name written into every metadata row.
    pub exchange: String,
    #[serde(default)]
    pub frequency: BarFrequency,
    pub source: SourceConfig,
    #[serde(default)]
    pub column_mapping: ColumnMapping,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Configuration(format!("read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, IngestError> {
        toml::from_str(content)
            .map_err(|e| IngestError::Configuration(format!("parse config TOML: {e}")))
    }

    pub fn to_toml(&self) -> Result<String, IngestError> {
        toml::to_string_pretty(self)
            .map_err(|e| IngestError::Configuration(format!("serialize config: {e}")))
    }

    /// Names of the environment variables this config reads.
    pub fn env_var_names(&self) -> Vec<&str> {
        match &self.source {
            SourceConfig::Directory { dir_env, .. } => dir_env.as_deref().into_iter().collect(),
            SourceConfig::SymbolList { symbols_env, .. } => {
                symbols_env.as_deref().into_iter().collect()
            }
        }
    }

    /// Expand a leading `~` in the directory source against `home`.
    pub fn expand_home(&mut self, home: &Path) {
        if let SourceConfig::Directory { dir: Some(dir), .. } = &mut self.source {
            if let Ok(rest) = dir.strip_prefix("~") {
                *dir = home.join(rest);
            }
        }
    }
}
