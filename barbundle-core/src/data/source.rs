//! Series sources: where one symbol's raw series comes from.
//!
//! Two implementations back the two ingestion strategies: [`FileSource`]
//! reads one file per symbol from a directory, [`DownloaderSource`] delegates
//! to a user-supplied [`Downloader`] (market-data API clients live outside
//! this crate).

use super::schema::TIMESTAMP;
use crate::config::FileFormat;
use crate::error::{BoxError, IngestError};
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// One symbol's series as obtained from its source, with source-specific
/// column names. The timestamp column is named `timestamp`.
#[derive(Debug, Clone)]
pub struct RawSeries {
    frame: DataFrame,
}

impl RawSeries {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }
}

impl From<DataFrame> for RawSeries {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

/// Outcome of a fetch.
#[derive(Debug)]
pub enum Fetched {
    Series(RawSeries),
    /// The source has no data for the symbol. Only file sources report this.
    Missing,
}

/// Trait for series sources.
///
/// Fetches are blocking. Retry and backoff, if any, belong to the
/// implementation; the pipeline calls `fetch` once per symbol.
pub trait SeriesSource {
    fn fetch(&self, symbol: &str) -> Result<Fetched, IngestError>;
}

/// Reads `<dir>/<symbol>.<ext>` files.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
    index_column: String,
    format: FileFormat,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>, index_column: impl Into<String>, format: FileFormat) -> Self {
        Self {
            dir: dir.into(),
            index_column: index_column.into(),
            format,
        }
    }

    /// Path of the file holding `symbol`'s series.
    pub fn symbol_path(&self, symbol: &str) -> PathBuf {
        self.dir
            .join(format!("{symbol}.{}", self.format.extension()))
    }

    fn read(&self, path: &Path) -> PolarsResult<DataFrame> {
        match self.format {
            FileFormat::Csv => LazyCsvReader::new(path)
                .with_has_header(true)
                .with_try_parse_dates(true)
                .finish()?
                .collect(),
            FileFormat::Parquet => LazyFrame::scan_parquet(path, Default::default())?.collect(),
        }
    }
}

impl SeriesSource for FileSource {
    fn fetch(&self, symbol: &str) -> Result<Fetched, IngestError> {
        let path = self.symbol_path(symbol);
        if !path.is_file() {
            return Ok(Fetched::Missing);
        }

        let mut frame = self
            .read(&path)
            .map_err(|e| IngestError::source_read(symbol, format!("{}: {e}", path.display())))?;

        if self.index_column != TIMESTAMP {
            if frame.get_column_index(&self.index_column).is_none() {
                return Err(IngestError::source_read(
                    symbol,
                    format!(
                        "{}: index column '{}' not found",
                        path.display(),
                        self.index_column
                    ),
                ));
            }
            frame
                .rename(&self.index_column, TIMESTAMP.into())
                .map_err(|e| IngestError::source_read(symbol, e))?;
        }

        Ok(Fetched::Series(RawSeries::new(frame)))
    }
}

/// Fetches one symbol's series from a remote API.
///
/// Implemented for any `Fn(&str) -> Result<RawSeries, E>` closure.
pub trait Downloader {
    fn download(&self, symbol: &str) -> Result<RawSeries, BoxError>;
}

impl<F, E> Downloader for F
where
    F: Fn(&str) -> Result<RawSeries, E>,
    E: Into<BoxError>,
{
    fn download(&self, symbol: &str) -> Result<RawSeries, BoxError> {
        self(symbol).map_err(Into::into)
    }
}

/// Adapts a [`Downloader`] to [`SeriesSource`]. Never reports `Missing`:
/// every failure is the downloader's error, passed through unchanged.
pub struct DownloaderSource<'a> {
    downloader: &'a dyn Downloader,
}

impl<'a> DownloaderSource<'a> {
    pub fn new(downloader: &'a dyn Downloader) -> Self {
        Self { downloader }
    }
}

impl SeriesSource for DownloaderSource<'_> {
    fn fetch(&self, symbol: &str) -> Result<Fetched, IngestError> {
        self.downloader
            .download(symbol)
            .map(Fetched::Series)
            .map_err(|source| IngestError::SourceRead {
                symbol: symbol.to_string(),
                source,
            })
    }
}
