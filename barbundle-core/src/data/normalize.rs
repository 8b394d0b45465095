//! Series normalization: column renaming, default factor columns, canonical
//! ordering.
//!
//! Normalization is pure. It never looks at metadata, and metadata is only
//! ever derived from its output.

use super::filter::SeriesFilter;
use super::schema::{
    has_column, BarSchema, SchemaError, DIVIDEND, SPLIT, TIMESTAMP, VALUE_COLUMNS,
};
use super::source::RawSeries;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Source column label → canonical column label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<String, String>);

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.0.insert(from.into(), to.into());
    }

    pub fn target(&self, from: &str) -> Option<&str> {
        self.0.get(from).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unsupported timestamp column type {0:?}; expected a date, naive datetime, or epoch milliseconds")]
    TimestampType(DataType),

    #[error("{0} row(s) have no timestamp")]
    NullTimestamp(usize),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// A series in canonical form.
///
/// Guarantees: the columns of [`BarSchema`] are present with their canonical
/// dtypes, rows are sorted ascending by timestamp, and timestamps are unique.
/// Only the normalizer constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    frame: DataFrame,
}

impl NormalizedSeries {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// First and last timestamps, or `None` for an empty series.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let ts = self
            .frame
            .column(TIMESTAMP)
            .ok()?
            .cast(&DataType::Int64)
            .ok()?;
        let ca = ts.i64().ok()?;
        let first = ca.get(0)?;
        let last = ca.get(ca.len().checked_sub(1)?)?;
        Some((millis_to_naive(first)?, millis_to_naive(last)?))
    }

    /// Apply a row filter. Filters may drop rows but must keep the columns.
    pub fn filtered(self, filter: &dyn SeriesFilter) -> Result<Self, NormalizeError> {
        let frame = filter.apply(self.frame)?;
        BarSchema::validate(&frame)?;
        Ok(Self { frame })
    }
}

pub(crate) fn millis_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Normalize one raw series.
///
/// 1. rename columns named in `mapping` (others pass through)
/// 2. add `dividend = 0` and `split = 1` when absent
/// 3. coerce the timestamp to `Datetime(ms)` and value columns to `Float64`
/// 4. stable sort by timestamp, keep the first row of each timestamp
///
/// Re-normalizing the output yields an identical frame.
pub fn normalize(raw: RawSeries, mapping: &ColumnMapping) -> Result<NormalizedSeries, NormalizeError> {
    let mut df = raw.into_frame();

    if !mapping.is_empty() {
        let renamed: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| mapping.target(name.as_str()).unwrap_or(name.as_str()).to_string())
            .collect();
        df.set_column_names(renamed)?;
    }

    let height = df.height();
    if !has_column(&df, DIVIDEND) {
        df.with_column(Column::new(DIVIDEND.into(), vec![0.0f64; height]))?;
    }
    if !has_column(&df, SPLIT) {
        df.with_column(Column::new(SPLIT.into(), vec![1.0f64; height]))?;
    }

    coerce_timestamp(&mut df)?;
    let nulls = df.column(TIMESTAMP)?.null_count();
    if nulls > 0 {
        return Err(NormalizeError::NullTimestamp(nulls));
    }
    for name in VALUE_COLUMNS {
        let column = df
            .column(name)
            .map_err(|_| SchemaError::MissingColumn(name.to_string()))?;
        if column.dtype() != &DataType::Float64 {
            let cast = column.cast(&DataType::Float64)?;
            df.with_column(cast)?;
        }
    }

    let df = df
        .lazy()
        .sort(
            [TIMESTAMP],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .unique_stable(Some(vec![TIMESTAMP.into()]), UniqueKeepStrategy::First)
        .collect()?;

    BarSchema::validate(&df)?;
    Ok(NormalizedSeries { frame: df })
}

fn coerce_timestamp(df: &mut DataFrame) -> Result<(), NormalizeError> {
    let target = BarSchema::timestamp_dtype();
    let dtype = df
        .column(TIMESTAMP)
        .map_err(|_| SchemaError::MissingColumn(TIMESTAMP.to_string()))?
        .dtype()
        .clone();
    if dtype == target {
        return Ok(());
    }

    match dtype {
        DataType::Date | DataType::Datetime(_, None) | DataType::Int64 => {
            let cast = df.column(TIMESTAMP)?.cast(&target)?;
            df.with_column(cast)?;
            Ok(())
        }
        other => Err(NormalizeError::TimestampType(other)),
    }
}

/// Column mapping plus post-normalization filters, applied per symbol.
#[derive(Default)]
pub struct SeriesNormalizer {
    mapping: ColumnMapping,
    filters: Vec<Box<dyn SeriesFilter>>,
}

impl SeriesNormalizer {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self {
            mapping,
            filters: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_filter(mut self, filter: Box<dyn SeriesFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn normalize(&self, raw: RawSeries) -> Result<NormalizedSeries, NormalizeError> {
        let mut series = normalize(raw, &self.mapping)?;
        for filter in &self.filters {
            series = series.filtered(filter.as_ref())?;
        }
        Ok(series)
    }
}

impl fmt::Debug for SeriesNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesNormalizer")
            .field("mapping", &self.mapping)
            .field(
                "filters",
                &self.filters.iter().map(|flt| flt.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
