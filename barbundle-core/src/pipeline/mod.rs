//! Ingestion pipeline: metadata accumulation, the series stream, writer
//! traits, and the orchestrator tying them together.

pub mod ingester;
pub mod metadata;
pub mod stream;
pub mod writer;

pub use ingester::{IngestPhase, IngestReport, Ingester, SourcePlan};
pub use metadata::{MetadataAccumulator, MetadataRow};
pub use stream::{SeriesStream, StreamItem};
pub use writer::{AdjustmentWriter, AssetDbWriter, BarWriter, WriterSet};
