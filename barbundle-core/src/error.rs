//! Structured error types for an ingestion run.
//!
//! Every variant is fatal for the run that raised it: the orchestrator never
//! flushes metadata after an error, so there is no partial-success mode.

use crate::data::normalize::NormalizeError;
use thiserror::Error;

/// Boxed error returned by fetch collaborators (downloaders, file readers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// No usable symbol source, or an unreadable/invalid config file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A fetch collaborator failed. Downloader errors are carried unchanged.
    #[error("failed to read series for '{symbol}': {source}")]
    SourceRead {
        symbol: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to normalize series for '{symbol}': {source}")]
    Normalization {
        symbol: String,
        #[source]
        source: NormalizeError,
    },

    /// Start and end dates are undefined for a series with no rows.
    #[error("series for '{symbol}' has no rows after normalization")]
    EmptySeries { symbol: String },

    #[error("metadata update for index {index} is outside the live table (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Rows were never populated before the flush, e.g. the bar writer
    /// abandoned the stream early.
    #[error("metadata rows never populated for symbol indices {missing:?}")]
    MetadataInconsistency { missing: Vec<usize> },

    #[error("write failed: {0}")]
    Write(String),
}

impl IngestError {
    pub(crate) fn source_read(symbol: &str, source: impl Into<BoxError>) -> Self {
        Self::SourceRead {
            symbol: symbol.to_string(),
            source: source.into(),
        }
    }
}
