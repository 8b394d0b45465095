//! The ingestion entry point.
//!
//! An [`Ingester`] runs one bundle's ingestion:
//! 1. resolve symbols (an empty list is fine, writers then see zero rows)
//! 2. allocate the metadata table
//! 3. hand the series stream to the bar writer picked by frequency
//! 4. flush the completed metadata table to the asset writer
//! 5. call the adjustment writer
//!
//! Any failure ends the run. Metadata is only flushed once every produced
//! series has its row.

use super::metadata::{MetadataAccumulator, MetadataRow};
use super::stream::SeriesStream;
use super::writer::{BarWriter, WriterSet};
use crate::config::{BarFrequency, FileFormat, IngestConfig, SourceConfig};
use crate::data::filter::SeriesFilter;
use crate::data::normalize::{ColumnMapping, SeriesNormalizer};
use crate::data::resolver::{DirectoryResolver, ListResolver};
use crate::data::source::{Downloader, DownloaderSource, FileSource, SeriesSource};
use crate::env::Environment;
use crate::error::IngestError;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Run phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    Created,
    SymbolsResolved,
    MetadataAllocated,
    SeriesStreaming,
    MetadataFlushed,
    Done,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestPhase::Created => "created",
            IngestPhase::SymbolsResolved => "symbols_resolved",
            IngestPhase::MetadataAllocated => "metadata_allocated",
            IngestPhase::SeriesStreaming => "series_streaming",
            IngestPhase::MetadataFlushed => "metadata_flushed",
            IngestPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// How symbols are found and fetched. One variant per ingestion strategy.
pub enum SourcePlan {
    /// One file per symbol in a directory.
    Files {
        resolver: DirectoryResolver,
        index_column: String,
        format: FileFormat,
    },
    /// A symbol list, each symbol fetched by a downloader.
    Download {
        resolver: ListResolver,
        downloader: Box<dyn Downloader>,
    },
}

impl SourcePlan {
    /// Resolve the symbol list and open the matching series source.
    fn open(
        &self,
        env: &Environment,
    ) -> Result<(Vec<String>, Box<dyn SeriesSource + '_>), IngestError> {
        match self {
            SourcePlan::Files {
                resolver,
                index_column,
                format,
            } => {
                let resolved = resolver.resolve(env)?;
                debug!(dir = %resolved.dir.display(), "source directory");
                let source = FileSource::new(resolved.dir, index_column.clone(), *format);
                Ok((resolved.symbols, Box::new(source)))
            }
            SourcePlan::Download {
                resolver,
                downloader,
            } => {
                let symbols = resolver.resolve(env);
                Ok((symbols, Box::new(DownloaderSource::new(downloader.as_ref()))))
            }
        }
    }
}

impl fmt::Debug for SourcePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourcePlan::Files {
                resolver,
                index_column,
                format,
            } => f
                .debug_struct("Files")
                .field("resolver", resolver)
                .field("index_column", index_column)
                .field("format", format)
                .finish(),
            SourcePlan::Download { resolver, .. } => f
                .debug_struct("Download")
                .field("resolver", resolver)
                .finish_non_exhaustive(),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Symbols the resolver returned.
    pub resolved: usize,
    /// Series written (equals `metadata.len()`).
    pub written: usize,
    /// Symbols skipped because their source had no data.
    pub skipped: usize,
    /// The metadata table as flushed.
    pub metadata: Vec<MetadataRow>,
}

#[derive(Debug)]
pub struct Ingester {
    exchange: String,
    frequency: BarFrequency,
    plan: SourcePlan,
    normalizer: SeriesNormalizer,
}

impl Ingester {
    /// Ingest one `<symbol>.<ext>` file per symbol from a directory.
    ///
    /// The directory is the value of `dir_env` when that names an existing
    /// directory, otherwise `dir`.
    pub fn csv_directory(
        exchange: impl Into<String>,
        frequency: BarFrequency,
        dir: Option<PathBuf>,
        dir_env: Option<String>,
        index_column: impl Into<String>,
    ) -> Self {
        Self::files(exchange, frequency, dir, dir_env, index_column, FileFormat::Csv)
    }

    pub fn files(
        exchange: impl Into<String>,
        frequency: BarFrequency,
        dir: Option<PathBuf>,
        dir_env: Option<String>,
        index_column: impl Into<String>,
        format: FileFormat,
    ) -> Self {
        Self::with_plan(
            exchange,
            frequency,
            SourcePlan::Files {
                resolver: DirectoryResolver::new(dir, dir_env, format.extension()),
                index_column: index_column.into(),
                format,
            },
        )
    }

    /// Ingest a symbol list through a downloader. Downloader errors end the
    /// run unchanged.
    pub fn direct<I, S>(
        exchange: impl Into<String>,
        frequency: BarFrequency,
        symbols: I,
        symbols_env: Option<String>,
        downloader: impl Downloader + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_plan(
            exchange,
            frequency,
            SourcePlan::Download {
                resolver: ListResolver::new(symbols, symbols_env),
                downloader: Box::new(downloader),
            },
        )
    }

    pub fn with_plan(exchange: impl Into<String>, frequency: BarFrequency, plan: SourcePlan) -> Self {
        Self {
            exchange: exchange.into(),
            frequency,
            plan,
            normalizer: SeriesNormalizer::default(),
        }
    }

    /// Build from a config. Symbol-list sources need `downloader`.
    pub fn from_config(
        config: &IngestConfig,
        downloader: Option<Box<dyn Downloader>>,
    ) -> Result<Self, IngestError> {
        let plan = match (&config.source, downloader) {
            (
                SourceConfig::Directory {
                    dir,
                    dir_env,
                    index_column,
                    format,
                },
                _,
            ) => SourcePlan::Files {
                resolver: DirectoryResolver::new(dir.clone(), dir_env.clone(), format.extension()),
                index_column: index_column.clone(),
                format: *format,
            },
            (
                SourceConfig::SymbolList {
                    symbols,
                    symbols_env,
                },
                Some(downloader),
            ) => SourcePlan::Download {
                resolver: ListResolver::new(symbols.iter().cloned(), symbols_env.clone()),
                downloader,
            },
            (SourceConfig::SymbolList { .. }, None) => {
                return Err(IngestError::Configuration(
                    "symbol_list sources need a downloader".into(),
                ))
            }
        };

        let mut ingester = Self::with_plan(config.exchange.clone(), config.frequency, plan)
            .with_column_mapping(config.column_mapping.clone());
        for filter in &config.filters {
            ingester = ingester.with_filter(filter.build());
        }
        Ok(ingester)
    }

    /// Rename source columns before defaults are injected.
    pub fn with_column_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.normalizer = std::mem::take(&mut self.normalizer).with_mapping(mapping);
        self
    }

    /// Apply `filter` to every series after normalization, in call order.
    pub fn with_filter(mut self, filter: Box<dyn SeriesFilter>) -> Self {
        self.normalizer = std::mem::take(&mut self.normalizer).with_filter(filter);
        self
    }

    pub fn frequency(&self) -> BarFrequency {
        self.frequency
    }

    /// Run the ingestion into `writers`.
    pub fn ingest(
        &self,
        env: &Environment,
        writers: WriterSet<'_>,
        show_progress: bool,
    ) -> Result<IngestReport, IngestError> {
        let mut phase = IngestPhase::Created;
        debug!(%phase, exchange = %self.exchange, frequency = %self.frequency);

        let (symbols, source) = self.plan.open(env)?;
        phase = IngestPhase::SymbolsResolved;
        debug!(%phase, count = symbols.len());
        if show_progress {
            info!("symbols are: {symbols:?}");
        }

        let mut metadata = MetadataAccumulator::allocate(symbols.len(), self.exchange.as_str());
        phase = IngestPhase::MetadataAllocated;
        debug!(%phase, rows = metadata.len());

        let bar_writer: &mut dyn BarWriter = match self.frequency {
            BarFrequency::Daily => writers.daily_bar,
            BarFrequency::Minute => writers.minute_bar,
        };
        phase = IngestPhase::SeriesStreaming;
        debug!(%phase);
        if show_progress {
            info!("writing {} bars...", self.frequency);
        }
        let stream = SeriesStream::new(
            &symbols,
            source.as_ref(),
            &self.normalizer,
            &mut metadata,
            show_progress,
        );
        bar_writer.write(stream, show_progress)?;

        let skipped = metadata.retired();
        let rows = metadata.finalize()?;
        if show_progress {
            info!("metadata: {} rows", rows.len());
            for row in &rows {
                info!(
                    "  {} {} .. {} (auto close {})",
                    row.symbol, row.start_date, row.end_date, row.auto_close_date
                );
            }
        }
        writers.asset_db.write(&rows)?;
        phase = IngestPhase::MetadataFlushed;
        debug!(%phase);

        writers.adjustment.write()?;
        phase = IngestPhase::Done;
        debug!(%phase);
        if show_progress {
            info!("writing completed");
        }

        Ok(IngestReport {
            resolved: symbols.len(),
            written: rows.len(),
            skipped,
            metadata: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        assert_eq!(IngestPhase::SeriesStreaming.to_string(), "series_streaming");
        assert_eq!(IngestPhase::Done.to_string(), "done");
    }

    #[test]
    fn symbol_list_config_without_downloader_is_rejected() {
        let config = IngestConfig::from_toml(
            "exchange = \"X\"\n[source]\nkind = \"symbol_list\"\nsymbols = [\"A\"]\n",
        )
        .unwrap();

        let err = Ingester::from_config(&config, None).unwrap_err();
        assert!(matches!(err, IngestError::Configuration(_)));
    }

    #[test]
    fn directory_config_builds_file_plan() {
        let config = IngestConfig::from_toml(
            "exchange = \"X\"\nfrequency = \"minute\"\n[source]\nkind = \"directory\"\nformat = \"parquet\"\n",
        )
        .unwrap();

        let ingester = Ingester::from_config(&config, None).unwrap();
        assert_eq!(ingester.frequency(), BarFrequency::Minute);
        assert!(matches!(
            ingester.plan,
            SourcePlan::Files {
                format: FileFormat::Parquet,
                ..
            }
        ));
    }
}
