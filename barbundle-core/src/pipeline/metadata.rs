//! Per-symbol metadata table.
//!
//! The table is positional: slot `i` belongs to stream element `i` no matter
//! in which order updates arrive. A slot that is still empty at
//! [`MetadataAccumulator::finalize`] makes the whole run fail.

use crate::data::normalize::NormalizedSeries;
use crate::error::IngestError;
use chrono::{Duration, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One symbol's row in the asset metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// One day past `end_date`.
    pub auto_close_date: NaiveDateTime,
    pub symbol: String,
    pub exchange: String,
}

impl MetadataRow {
    /// Derive a row from a series' first and last timestamps. `None` when the
    /// series is empty.
    pub fn from_series(symbol: &str, exchange: &str, series: &NormalizedSeries) -> Option<Self> {
        let (start_date, end_date) = series.bounds()?;
        Some(Self {
            start_date,
            end_date,
            auto_close_date: end_date + Duration::days(1),
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct MetadataAccumulator {
    exchange: String,
    slots: Vec<Option<MetadataRow>>,
    retired: usize,
}

impl MetadataAccumulator {
    /// Table with `n` empty slots, one per resolved symbol.
    pub fn allocate(n: usize, exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            slots: vec![None; n],
            retired: 0,
        }
    }

    /// Slots still expected to be filled.
    pub fn len(&self) -> usize {
        self.slots.len() - self.retired
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots given up for skipped symbols.
    pub fn retired(&self) -> usize {
        self.retired
    }

    /// Fill slot `index` from `series`. Re-filling a slot overwrites it.
    pub fn update(
        &mut self,
        index: usize,
        symbol: &str,
        series: &NormalizedSeries,
    ) -> Result<(), IngestError> {
        let len = self.len();
        if index >= len {
            return Err(IngestError::IndexOutOfRange { index, len });
        }
        let row = MetadataRow::from_series(symbol, &self.exchange, series).ok_or_else(|| {
            IngestError::EmptySeries {
                symbol: symbol.to_string(),
            }
        })?;
        self.slots[index] = Some(row);
        Ok(())
    }

    /// Give up the last live slot. Called once per skipped symbol so the table
    /// shrinks to the number of series actually produced.
    pub fn retire_slot(&mut self) {
        debug_assert!(self.retired < self.slots.len(), "retired more slots than allocated");
        self.retired = (self.retired + 1).min(self.slots.len());
    }

    /// The completed table, or the indices that were never filled.
    pub fn finalize(self) -> Result<Vec<MetadataRow>, IngestError> {
        let len = self.len();
        let mut rows = Vec::with_capacity(len);
        let mut missing = Vec::new();
        for (index, slot) in self.slots.into_iter().take(len).enumerate() {
            match slot {
                Some(row) => rows.push(row),
                None => missing.push(index),
            }
        }

        if missing.is_empty() {
            Ok(rows)
        } else {
            Err(IngestError::MetadataInconsistency { missing })
        }
    }
}

/// Render rows as the `equities` frame consumed by asset writers.
pub fn to_frame(rows: &[MetadataRow]) -> PolarsResult<DataFrame> {
    let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);
    let millis = |f: fn(&MetadataRow) -> NaiveDateTime| -> Vec<i64> {
        rows.iter()
            .map(|r| f(r).and_utc().timestamp_millis())
            .collect()
    };

    DataFrame::new(vec![
        Column::new("start_date".into(), millis(|r| r.start_date)).cast(&datetime)?,
        Column::new("end_date".into(), millis(|r| r.end_date)).cast(&datetime)?,
        Column::new("auto_close_date".into(), millis(|r| r.auto_close_date)).cast(&datetime)?,
        Column::new(
            "symbol".into(),
            rows.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "exchange".into(),
            rows.iter().map(|r| r.exchange.as_str()).collect::<Vec<_>>(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize::{normalize, ColumnMapping};
    use crate::data::source::RawSeries;
    use chrono::NaiveDate;

    fn series(first_day: u32, days: u32) -> NormalizedSeries {
        let ts: Vec<i64> = (first_day..first_day + days)
            .map(|d| {
                NaiveDate::from_ymd_opt(2020, 1, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_utc()
                    .timestamp_millis()
            })
            .collect();
        let n = ts.len();
        let frame = df!(
            "timestamp" => ts,
            "open" => vec![1.0; n],
            "high" => vec![1.0; n],
            "low" => vec![1.0; n],
            "close" => vec![1.0; n],
            "volume" => vec![1.0; n],
        )
        .unwrap();
        normalize(RawSeries::new(frame), &ColumnMapping::new()).unwrap()
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn row_spans_series_and_auto_closes_next_day() {
        let row = MetadataRow::from_series("A", "EXX", &series(1, 10)).unwrap();
        assert_eq!(row.start_date, day(1));
        assert_eq!(row.end_date, day(10));
        assert_eq!(row.auto_close_date, day(11));
        assert_eq!(row.symbol, "A");
        assert_eq!(row.exchange, "EXX");
    }

    #[test]
    fn out_of_order_updates_land_in_their_slots() {
        let mut acc = MetadataAccumulator::allocate(3, "EXX");
        acc.update(2, "C", &series(3, 2)).unwrap();
        acc.update(0, "A", &series(1, 2)).unwrap();
        acc.update(1, "B", &series(2, 2)).unwrap();

        let rows = acc.finalize().unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let mut acc = MetadataAccumulator::allocate(1, "EXX");
        acc.update(0, "A", &series(1, 5)).unwrap();
        acc.update(0, "A", &series(1, 5)).unwrap();

        let rows = acc.finalize().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].end_date, day(5));
    }

    #[test]
    fn unfilled_slot_is_an_inconsistency() {
        let mut acc = MetadataAccumulator::allocate(3, "EXX");
        acc.update(1, "B", &series(1, 2)).unwrap();

        match acc.finalize() {
            Err(IngestError::MetadataInconsistency { missing }) => assert_eq!(missing, vec![0, 2]),
            other => panic!("expected MetadataInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn retired_slots_shrink_the_table() {
        let mut acc = MetadataAccumulator::allocate(3, "EXX");
        acc.retire_slot();
        assert_eq!(acc.len(), 2);
        acc.update(0, "A", &series(1, 2)).unwrap();
        acc.update(1, "C", &series(1, 2)).unwrap();

        assert!(matches!(
            acc.update(2, "X", &series(1, 2)),
            Err(IngestError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(acc.finalize().unwrap().len(), 2);
    }

    #[test]
    fn empty_allocation_finalizes_to_no_rows() {
        let acc = MetadataAccumulator::allocate(0, "EXX");
        assert!(acc.is_empty());
        assert!(acc.finalize().unwrap().is_empty());
    }

    #[test]
    fn frame_has_equities_columns() {
        let rows = vec![MetadataRow::from_series("A", "EXX", &series(1, 3)).unwrap()];
        let df = to_frame(&rows).unwrap();

        assert_eq!(df.height(), 1);
        for name in ["start_date", "end_date", "auto_close_date", "symbol", "exchange"] {
            assert!(df.column(name).is_ok(), "missing {name}");
        }
        assert_eq!(
            df.column("symbol").unwrap().str().unwrap().get(0),
            Some("A")
        );
    }
}
