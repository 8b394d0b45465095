//! Writer collaborators: the storage side of an ingestion.
//!
//! The pipeline only depends on these traits. [`crate::store`] has a local
//! Parquet implementation; a host platform plugs in its own.

use super::metadata::MetadataRow;
use super::stream::SeriesStream;
use crate::error::IngestError;

/// Consumes the bar stream.
///
/// Implementations must drain `bars` completely: pulling it is what
/// populates the metadata table. On an `Err` element, return that error.
pub trait BarWriter {
    fn write(&mut self, bars: SeriesStream<'_>, show_progress: bool) -> Result<(), IngestError>;
}

/// Receives the completed metadata table, one row per written series.
pub trait AssetDbWriter {
    fn write(&mut self, equities: &[MetadataRow]) -> Result<(), IngestError>;
}

/// Called once with no data: split and dividend factors travel inline in
/// each series.
pub trait AdjustmentWriter {
    fn write(&mut self) -> Result<(), IngestError>;
}

/// The writer bundle handed to one ingestion run.
pub struct WriterSet<'w> {
    pub asset_db: &'w mut dyn AssetDbWriter,
    pub daily_bar: &'w mut dyn BarWriter,
    pub minute_bar: &'w mut dyn BarWriter,
    pub adjustment: &'w mut dyn AdjustmentWriter,
}
