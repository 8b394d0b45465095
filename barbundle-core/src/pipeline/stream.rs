//! The streaming converter.
//!
//! [`SeriesStream`] yields `(index, series)` pairs one symbol at a time and
//! writes each element's metadata row inside `next()`. It holds the run's
//! [`MetadataAccumulator`] by exclusive borrow, so the table cannot be read
//! or flushed while a consumer still owns the stream, and the stream itself
//! is consumed by value: it can be drained once and never restarted.

use super::metadata::MetadataAccumulator;
use crate::data::normalize::{NormalizedSeries, SeriesNormalizer};
use crate::data::source::{Fetched, SeriesSource};
use crate::error::IngestError;
use std::slice;
use tracing::{debug, info};

pub type StreamItem = Result<(usize, NormalizedSeries), IngestError>;

pub struct SeriesStream<'a> {
    symbols: slice::Iter<'a, String>,
    total: usize,
    position: usize,
    source: &'a dyn SeriesSource,
    normalizer: &'a SeriesNormalizer,
    metadata: &'a mut MetadataAccumulator,
    /// Index of the next yielded element. Skips do not advance it.
    next_index: usize,
    show_progress: bool,
    failed: bool,
}

impl<'a> SeriesStream<'a> {
    pub fn new(
        symbols: &'a [String],
        source: &'a dyn SeriesSource,
        normalizer: &'a SeriesNormalizer,
        metadata: &'a mut MetadataAccumulator,
        show_progress: bool,
    ) -> Self {
        Self {
            symbols: symbols.iter(),
            total: symbols.len(),
            position: 0,
            source,
            normalizer,
            metadata,
            next_index: 0,
            show_progress,
            failed: false,
        }
    }

    /// Number of resolved symbols this stream walks, skipped ones included.
    pub fn symbol_count(&self) -> usize {
        self.total
    }

    /// Fetch, normalize, and record one symbol. `Ok(None)` means skipped.
    fn produce(&mut self, symbol: &str) -> Result<Option<(usize, NormalizedSeries)>, IngestError> {
        let raw = match self.source.fetch(symbol)? {
            Fetched::Series(raw) => raw,
            Fetched::Missing => {
                debug!(symbol, "no data for symbol, skipping");
                self.metadata.retire_slot();
                return Ok(None);
            }
        };

        let series = self
            .normalizer
            .normalize(raw)
            .map_err(|source| IngestError::Normalization {
                symbol: symbol.to_string(),
                source,
            })?;
        if series.is_empty() {
            return Err(IngestError::EmptySeries {
                symbol: symbol.to_string(),
            });
        }

        let index = self.next_index;
        self.metadata.update(index, symbol, &series)?;
        self.next_index += 1;
        Ok(Some((index, series)))
    }
}

impl Iterator for SeriesStream<'_> {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        if self.failed {
            return None;
        }

        loop {
            let symbol = self.symbols.next()?;
            self.position += 1;
            if self.show_progress {
                info!("[{}/{}] loading {symbol}", self.position, self.total);
            }

            match self.produce(symbol) {
                Ok(Some(item)) => return Some(Ok(item)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            // Any remaining symbol may be skipped.
            (0, Some(self.symbols.len()))
        }
    }
}
