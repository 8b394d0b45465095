//! BarBundle Core: ingestion of per-symbol OHLCV series into a bar bundle.
//!
//! This crate contains:
//! - Symbol resolution from a directory listing or a configured symbol list
//! - Series sources (CSV/Parquet files, pluggable downloaders)
//! - Normalization into the canonical bar schema
//! - The streaming converter that fills the metadata table as series are written
//! - The ingestion orchestrator and its writer traits
//! - A local Parquet bundle store

pub mod config;
pub mod data;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod store;

pub use config::{BarFrequency, FileFormat, IngestConfig, SourceConfig};
pub use env::Environment;
pub use error::{BoxError, IngestError};
pub use pipeline::{IngestReport, Ingester, MetadataRow, WriterSet};
pub use store::{BundleManifest, ParquetBundle};
