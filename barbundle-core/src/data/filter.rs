//! Row filters applied to a series after normalization.
//!
//! A filter may drop rows; it must not rename, drop, or retype columns.

use super::normalize::millis_to_naive;
use super::schema::{CLOSE, HIGH, LOW, OPEN, TIMESTAMP, VOLUME};
use chrono::{Datelike, NaiveDate, Weekday};
use polars::prelude::*;

pub trait SeriesFilter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn apply(&self, frame: DataFrame) -> PolarsResult<DataFrame>;
}

/// Drops bars violating OHLC sanity (no non-positive prices, high >= low,
/// open and close within the bar's range, non-negative volume).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidBarsFilter;

impl SeriesFilter for ValidBarsFilter {
    fn name(&self) -> &str {
        "valid_bars"
    }

    fn apply(&self, frame: DataFrame) -> PolarsResult<DataFrame> {
        frame
            .lazy()
            .filter(
                col(HIGH)
                    .gt_eq(col(LOW))
                    .and(col(OPEN).gt(lit(0.0)))
                    .and(col(HIGH).gt(lit(0.0)))
                    .and(col(LOW).gt(lit(0.0)))
                    .and(col(CLOSE).gt(lit(0.0)))
                    .and(col(VOLUME).gt_eq(lit(0.0)))
                    .and(col(OPEN).gt_eq(col(LOW)))
                    .and(col(OPEN).lt_eq(col(HIGH)))
                    .and(col(CLOSE).gt_eq(col(LOW)))
                    .and(col(CLOSE).lt_eq(col(HIGH))),
            )
            .collect()
    }
}

/// Trading calendar collaborator: which dates the exchange trades.
pub trait TradingCalendar: Send + Sync {
    fn is_session(&self, date: NaiveDate) -> bool;
}

/// Monday through Friday, no holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCalendar;

impl TradingCalendar for WeekdayCalendar {
    fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// Keeps rows whose timestamp falls on a calendar session.
#[derive(Debug, Clone)]
pub struct SessionFilter<C> {
    calendar: C,
}

impl<C: TradingCalendar> SessionFilter<C> {
    pub fn new(calendar: C) -> Self {
        Self { calendar }
    }
}

impl<C: TradingCalendar> SeriesFilter for SessionFilter<C> {
    fn name(&self) -> &str {
        "sessions"
    }

    fn apply(&self, frame: DataFrame) -> PolarsResult<DataFrame> {
        let ts = frame.column(TIMESTAMP)?.cast(&DataType::Int64)?;
        let mask: BooleanChunked = ts
            .i64()?
            .into_iter()
            .map(|ms| {
                ms.and_then(millis_to_naive)
                    .map(|dt| self.calendar.is_session(dt.date()))
            })
            .collect();
        frame.filter(&mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalize::{normalize, ColumnMapping};
    use crate::data::source::RawSeries;

    fn day_ms(d: u32) -> i64 {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn valid_bars_rejects_inverted_and_negative_bars() {
        let frame = df!(
            "timestamp" => &[day_ms(1), day_ms(2), day_ms(3)],
            "open" => &[100.0, -100.0, 100.0],
            "high" => &[95.0, 105.0, 105.0],
            "low" => &[105.0, 99.0, 99.0],
            "close" => &[102.0, 103.0, 103.0],
            "volume" => &[1000.0, 1000.0, 1000.0],
        )
        .unwrap();

        let validated = ValidBarsFilter.apply(frame).unwrap();

        assert_eq!(validated.height(), 1);
        let ts = validated.column(TIMESTAMP).unwrap().i64().unwrap();
        assert_eq!(ts.get(0), Some(day_ms(3)));
    }

    #[test]
    fn weekday_calendar_excludes_weekends() {
        let cal = WeekdayCalendar;
        // 2020-01-04 was a Saturday.
        assert!(cal.is_session(NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()));
        assert!(!cal.is_session(NaiveDate::from_ymd_opt(2020, 1, 4).unwrap()));
        assert!(!cal.is_session(NaiveDate::from_ymd_opt(2020, 1, 5).unwrap()));
        assert!(cal.is_session(NaiveDate::from_ymd_opt(2020, 1, 6).unwrap()));
    }

    #[test]
    fn session_filter_drops_weekend_rows() {
        let frame = df!(
            "timestamp" => &(1..=7).map(day_ms).collect::<Vec<_>>(),
            "open" => &[1.0; 7],
            "high" => &[1.0; 7],
            "low" => &[1.0; 7],
            "close" => &[1.0; 7],
            "volume" => &[1.0; 7],
        )
        .unwrap();
        let series = normalize(RawSeries::new(frame), &ColumnMapping::new()).unwrap();

        let filtered = series
            .filtered(&SessionFilter::new(WeekdayCalendar))
            .unwrap();

        // Jan 1-7 2020 contains one weekend (4th, 5th).
        assert_eq!(filtered.len(), 5);
        let (_, end) = filtered.bounds().unwrap();
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2020, 1, 7).unwrap());
    }
}
