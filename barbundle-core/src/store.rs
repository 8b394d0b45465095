//! Local Parquet bundle: a directory implementation of the writer traits.
//!
//! Layout:
//! - `{root}/{daily|minute}/{index}.parquet`: one file per series
//! - `{root}/equities.parquet`: the metadata table
//! - `{root}/adjustments.json`: empty split/dividend tables
//! - `{root}/manifest.json`: run summary with a BLAKE3 hash of the metadata
//!
//! Every file is written atomically (write to .tmp, rename into place).

use crate::config::{BarFrequency, IngestConfig};
use crate::error::IngestError;
use crate::pipeline::metadata::{self, MetadataRow};
use crate::pipeline::stream::SeriesStream;
use crate::pipeline::writer::{AdjustmentWriter, AssetDbWriter, BarWriter, WriterSet};
use crate::pipeline::IngestReport;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const EQUITIES_FILE: &str = "equities.parquet";
const ADJUSTMENTS_FILE: &str = "adjustments.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Summary sidecar written after a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub exchange: String,
    pub frequency: BarFrequency,
    pub symbols: Vec<String>,
    pub resolved: usize,
    pub skipped: usize,
    pub metadata_hash: String,
    pub ingested_at: NaiveDateTime,
}

impl BundleManifest {
    pub fn load(root: &Path) -> Result<Self, IngestError> {
        let path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| IngestError::Configuration(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| IngestError::Configuration(format!("parse {}: {e}", path.display())))
    }
}

/// Writes each series to `{dir}/{index}.parquet`.
#[derive(Debug)]
pub struct ParquetBarWriter {
    dir: PathBuf,
}

impl ParquetBarWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BarWriter for ParquetBarWriter {
    fn write(&mut self, bars: SeriesStream<'_>, show_progress: bool) -> Result<(), IngestError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| IngestError::Write(format!("failed to create dir: {e}")))?;

        let total = bars.symbol_count();
        let mut written = 0;
        for item in bars {
            let (index, series) = item?;
            let mut df = series.into_frame();
            write_parquet_atomic(&mut df, &self.dir.join(format!("{index}.parquet")))?;
            written += 1;
        }

        if show_progress {
            info!(dir = %self.dir.display(), "wrote {written} of {total} series");
        }
        Ok(())
    }
}

/// Writes the metadata table to a single Parquet file.
#[derive(Debug)]
pub struct ParquetAssetWriter {
    path: PathBuf,
}

impl ParquetAssetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AssetDbWriter for ParquetAssetWriter {
    fn write(&mut self, equities: &[MetadataRow]) -> Result<(), IngestError> {
        let mut df = metadata::to_frame(equities)
            .map_err(|e| IngestError::Write(format!("equities frame: {e}")))?;
        write_parquet_atomic(&mut df, &self.path)
    }
}

/// Writes empty split and dividend tables.
#[derive(Debug)]
pub struct JsonAdjustmentWriter {
    path: PathBuf,
}

impl JsonAdjustmentWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AdjustmentWriter for JsonAdjustmentWriter {
    fn write(&mut self) -> Result<(), IngestError> {
        let body = serde_json::json!({ "splits": [], "dividends": [] });
        let json = serde_json::to_string_pretty(&body)
            .map_err(|e| IngestError::Write(format!("adjustments serialization: {e}")))?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// A bundle directory with one writer per concern.
#[derive(Debug)]
pub struct ParquetBundle {
    root: PathBuf,
    daily: ParquetBarWriter,
    minute: ParquetBarWriter,
    assets: ParquetAssetWriter,
    adjustments: JsonAdjustmentWriter,
}

impl ParquetBundle {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| IngestError::Write(format!("failed to create dir: {e}")))?;
        Ok(Self {
            daily: ParquetBarWriter::new(root.join(BarFrequency::Daily.as_str())),
            minute: ParquetBarWriter::new(root.join(BarFrequency::Minute.as_str())),
            assets: ParquetAssetWriter::new(root.join(EQUITIES_FILE)),
            adjustments: JsonAdjustmentWriter::new(root.join(ADJUSTMENTS_FILE)),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Borrow the bundle's writers for one ingestion run.
    pub fn writers(&mut self) -> WriterSet<'_> {
        WriterSet {
            asset_db: &mut self.assets,
            daily_bar: &mut self.daily,
            minute_bar: &mut self.minute,
            adjustment: &mut self.adjustments,
        }
    }

    /// Path of the bar file for `index` at `frequency`.
    pub fn bar_path(&self, frequency: BarFrequency, index: usize) -> PathBuf {
        self.root
            .join(frequency.as_str())
            .join(format!("{index}.parquet"))
    }

    pub fn write_manifest(
        &self,
        config: &IngestConfig,
        report: &IngestReport,
    ) -> Result<BundleManifest, IngestError> {
        let manifest = BundleManifest {
            exchange: config.exchange.clone(),
            frequency: config.frequency,
            symbols: report.metadata.iter().map(|r| r.symbol.clone()).collect(),
            resolved: report.resolved,
            skipped: report.skipped,
            metadata_hash: metadata_hash(&report.metadata)?,
            ingested_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| IngestError::Write(format!("manifest serialization: {e}")))?;
        write_atomic(&self.root.join(MANIFEST_FILE), json.as_bytes())?;
        Ok(manifest)
    }
}

/// BLAKE3 over the JSON encoding of the rows.
pub fn metadata_hash(rows: &[MetadataRow]) -> Result<String, IngestError> {
    let bytes = serde_json::to_vec(rows)
        .map_err(|e| IngestError::Write(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Read a bar or equities file back.
pub fn read_parquet(path: &Path) -> Result<DataFrame, IngestError> {
    let file = fs::File::open(path)
        .map_err(|e| IngestError::Configuration(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| IngestError::Configuration(format!("read {}: {e}", path.display())))
}

// ── I/O helpers ─────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_parquet_atomic(df: &mut DataFrame, path: &Path) -> Result<(), IngestError> {
    let tmp = tmp_path(path);
    let file =
        fs::File::create(&tmp).map_err(|e| IngestError::Write(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| IngestError::Write(format!("write parquet: {e}")))?;
    rename_into_place(&tmp, path)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IngestError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)
        .map_err(|e| IngestError::Write(format!("write {}: {e}", tmp.display())))?;
    rename_into_place(&tmp, path)
}

fn rename_into_place(tmp: &Path, path: &Path) -> Result<(), IngestError> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        IngestError::Write(format!("atomic rename failed: {e}"))
    })
}
