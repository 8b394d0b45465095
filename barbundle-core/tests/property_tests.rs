//! Property tests for ingestion invariants.
//!
//! Uses proptest to verify:
//! 1. Symbol union: env and configured symbols merge without blanks or duplicates
//! 2. Normalization completeness: canonical columns, sorted unique timestamps
//! 3. Normalization idempotence: normalizing twice changes nothing
//! 4. Metadata alignment: every streamed element has its own row

use barbundle_core::data::{
    normalize, ColumnMapping, Fetched, ListResolver, RawSeries, SeriesNormalizer, SeriesSource,
};
use barbundle_core::pipeline::{MetadataAccumulator, SeriesStream};
use barbundle_core::{Environment, IngestError};
use polars::prelude::*;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_symbol() -> impl Strategy<Value = String> {
    "[A-Z]{1,4}"
}

/// Symbols padded with whitespace, with blank entries mixed in.
fn arb_messy_entry() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_symbol(),
        arb_symbol().prop_map(|s| format!("  {s} ")),
        Just(String::new()),
        Just("   ".to_string()),
    ]
}

/// Unsorted timestamps (day offsets, duplicates likely) with prices.
fn arb_raw_bars() -> impl Strategy<Value = Vec<(i64, f64)>> {
    prop::collection::vec((0i64..40, 1.0..500.0_f64), 0..30)
}

const DAY_MS: i64 = 86_400_000;
const EPOCH_2020: i64 = 1_577_836_800_000;

fn raw_frame(bars: &[(i64, f64)]) -> DataFrame {
    let ts: Vec<i64> = bars.iter().map(|(d, _)| EPOCH_2020 + d * DAY_MS).collect();
    let px: Vec<f64> = bars.iter().map(|(_, p)| *p).collect();
    let vol: Vec<i64> = (0..bars.len() as i64).collect();
    df!(
        "timestamp" => ts,
        "Open" => px.clone(),
        "High" => px.clone(),
        "Low" => px.clone(),
        "Close" => px,
        "Volume" => vol,
    )
    .unwrap()
}

fn yahoo_mapping() -> ColumnMapping {
    [
        ("Open", "open"),
        ("High", "high"),
        ("Low", "low"),
        ("Close", "close"),
        ("Volume", "volume"),
    ]
    .into_iter()
    .collect()
}

struct MapSource(HashMap<String, DataFrame>);

impl SeriesSource for MapSource {
    fn fetch(&self, symbol: &str) -> Result<Fetched, IngestError> {
        Ok(match self.0.get(symbol) {
            Some(df) => Fetched::Series(RawSeries::new(df.clone())),
            None => Fetched::Missing,
        })
    }
}

// ── 1. Symbol Union ──────────────────────────────────────────────────

proptest! {
    /// The result is exactly the set of non-blank trimmed entries of both inputs.
    #[test]
    fn symbol_union_is_exact(
        env_entries in prop::collection::vec(arb_messy_entry(), 0..8),
        configured in prop::collection::vec(arb_messy_entry(), 0..8),
    ) {
        let env = Environment::from_pairs([("SYMS", env_entries.join(","))]);
        let resolver = ListResolver::new(configured.clone(), Some("SYMS".into()));

        let resolved = resolver.resolve(&env);

        let expected: HashSet<String> = env_entries
            .iter()
            .chain(configured.iter())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let got: HashSet<String> = resolved.iter().cloned().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(resolved.len(), resolved.iter().collect::<HashSet<_>>().len());
        prop_assert!(resolved.iter().all(|s| !s.is_empty() && s.trim() == s));
    }
}

// ── 2. Normalization Completeness ────────────────────────────────────

proptest! {
    /// Output has canonical columns and strictly increasing timestamps.
    #[test]
    fn normalized_series_is_complete_and_ordered(bars in arb_raw_bars()) {
        let series = normalize(RawSeries::new(raw_frame(&bars)), &yahoo_mapping()).unwrap();
        let frame = series.frame();

        for name in ["open", "high", "low", "close", "volume", "dividend", "split"] {
            prop_assert_eq!(frame.column(name).unwrap().dtype(), &DataType::Float64);
        }

        let distinct: HashSet<i64> = bars.iter().map(|(d, _)| *d).collect();
        prop_assert_eq!(series.len(), distinct.len());

        let ts = frame.column("timestamp").unwrap().cast(&DataType::Int64).unwrap();
        let ts: Vec<i64> = ts.i64().unwrap().into_no_null_iter().collect();
        prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    /// The first raw row of each timestamp wins.
    #[test]
    fn duplicates_keep_first_occurrence(bars in arb_raw_bars()) {
        let series = normalize(RawSeries::new(raw_frame(&bars)), &yahoo_mapping()).unwrap();

        let mut first: HashMap<i64, f64> = HashMap::new();
        for (d, p) in &bars {
            first.entry(EPOCH_2020 + d * DAY_MS).or_insert(*p);
        }
        let ts = series.frame().column("timestamp").unwrap().cast(&DataType::Int64).unwrap();
        let close = series.frame().column("close").unwrap().f64().unwrap().clone();
        for (t, c) in ts.i64().unwrap().into_no_null_iter().zip(close.into_no_null_iter()) {
            prop_assert_eq!(first[&t], c);
        }
    }
}

// ── 3. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn normalization_is_idempotent(bars in arb_raw_bars()) {
        let once = normalize(RawSeries::new(raw_frame(&bars)), &yahoo_mapping()).unwrap();
        let twice = normalize(RawSeries::new(once.frame().clone()), &ColumnMapping::new()).unwrap();
        prop_assert!(once.frame().equals_missing(twice.frame()));
    }
}

// ── 4. Metadata Alignment ────────────────────────────────────────────

proptest! {
    /// With some symbols missing, indices stay dense and each row matches
    /// the element streamed at its index.
    #[test]
    fn stream_indices_align_with_metadata(
        present in prop::collection::vec((any::<bool>(), 1usize..15), 0..10),
    ) {
        let symbols: Vec<String> = (0..present.len()).map(|i| format!("S{i}")).collect();
        let frames: HashMap<String, DataFrame> = present
            .iter()
            .enumerate()
            .filter(|(_, (keep, _))| *keep)
            .map(|(i, (_, n))| {
                let bars: Vec<(i64, f64)> = (0..*n as i64).map(|d| (d, 10.0)).collect();
                (format!("S{i}"), raw_frame(&bars))
            })
            .collect();
        let source = MapSource(frames);
        let normalizer = SeriesNormalizer::new(yahoo_mapping());
        let mut metadata = MetadataAccumulator::allocate(symbols.len(), "EXX");

        let items: Vec<_> = SeriesStream::new(&symbols, &source, &normalizer, &mut metadata, false)
            .collect::<Result<_, _>>()
            .unwrap();
        let rows = metadata.finalize().unwrap();

        prop_assert_eq!(rows.len(), items.len());
        for (expected, (index, series)) in items.iter().enumerate() {
            prop_assert_eq!(*index, expected);
            let (start, end) = series.bounds().unwrap();
            prop_assert_eq!(rows[*index].start_date, start);
            prop_assert_eq!(rows[*index].end_date, end);
        }
        let kept: Vec<String> = present
            .iter()
            .enumerate()
            .filter(|(_, (keep, _))| *keep)
            .map(|(i, _)| format!("S{i}"))
            .collect();
        prop_assert_eq!(rows.iter().map(|r| r.symbol.clone()).collect::<Vec<_>>(), kept);
    }
}
