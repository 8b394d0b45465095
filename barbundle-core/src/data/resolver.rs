//! Symbol resolution: which symbols an ingestion run covers, in which order.
//!
//! Resolution only reads the filesystem and the captured [`Environment`].
//! An empty result is valid; it is never an error.

use crate::env::Environment;
use crate::error::IngestError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Discovers symbols as the base names of `<symbol>.<ext>` files in a
/// directory.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    dir: Option<PathBuf>,
    dir_env: Option<String>,
    extension: String,
}

/// The directory a [`DirectoryResolver`] settled on, and what it found there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirectory {
    pub dir: PathBuf,
    pub symbols: Vec<String>,
}

impl DirectoryResolver {
    pub fn new(dir: Option<PathBuf>, dir_env: Option<String>, extension: impl Into<String>) -> Self {
        Self {
            dir,
            dir_env,
            extension: extension.into(),
        }
    }

    /// Pick the source directory.
    ///
    /// The override variable wins when it names an existing directory, then
    /// the configured directory; otherwise a configuration error.
    pub fn source_dir(&self, env: &Environment) -> Result<PathBuf, IngestError> {
        if let Some(path) = env.lookup(self.dir_env.as_deref()) {
            let path = Path::new(path);
            if path.is_dir() {
                return Ok(path.to_path_buf());
            }
            debug!(path = %path.display(), "directory override is not a valid directory");
        }

        if let Some(dir) = &self.dir {
            if dir.is_dir() {
                return Ok(dir.clone());
            }
        }

        let mut msg = String::from("source directory is not valid");
        if let Some(var) = &self.dir_env {
            msg.push_str(&format!("; it can be set via environment variable '{var}'"));
        }
        msg.push_str("; it can also be set with `dir` in the bundle config");
        Err(IngestError::Configuration(msg))
    }

    /// List symbols, sorted so repeated calls over the same directory agree.
    pub fn resolve(&self, env: &Environment) -> Result<ResolvedDirectory, IngestError> {
        let dir = self.source_dir(env)?;
        let entries = fs::read_dir(&dir).map_err(|e| {
            IngestError::Configuration(format!("read directory {}: {e}", dir.display()))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                IngestError::Configuration(format!("read directory {}: {e}", dir.display()))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.is_empty() {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();

        Ok(ResolvedDirectory { dir, symbols })
    }
}

/// Union of configured symbols and a comma-separated environment list.
#[derive(Debug, Clone, Default)]
pub struct ListResolver {
    symbols: Vec<String>,
    symbols_env: Option<String>,
}

impl ListResolver {
    pub fn new<I, S>(symbols: I, symbols_env: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            symbols_env,
        }
    }

    /// Trimmed, de-duplicated symbols, environment entries first. Blank
    /// entries are dropped from both inputs.
    pub fn resolve(&self, env: &Environment) -> Vec<String> {
        let from_env = env
            .lookup(self.symbols_env.as_deref())
            .map(|list| list.split(',').collect::<Vec<_>>())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let symbols: Vec<String> = from_env
            .into_iter()
            .chain(self.symbols.iter().map(|s| s.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(*s))
            .map(String::from)
            .collect();

        if symbols.is_empty() {
            match &self.symbols_env {
                Some(var) => warn!("symbol list is empty; set symbols in the config or via '{var}'"),
                None => warn!("symbol list is empty"),
            }
        }
        symbols
    }
}
