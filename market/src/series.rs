//! OHLC series as returned by a single provider call.

use chrono::{DateTime, Utc};

use crate::errors::FetchError;
use crate::types::OhlcCandle;

/// Provider wire row: `[timestamp_ms, open, high, low, close]`.
pub type RawOhlcRow = [f64; 5];

/// Timestamp-ascending OHLC bars without duplicate timestamps.
///
/// Never empty: construction rejects an empty payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcSeries {
    candles: Vec<OhlcCandle>,
}

impl OhlcSeries {
    /// Validate and normalize raw provider rows.
    ///
    /// Rows may arrive unordered; they are sorted by timestamp and, when a
    /// timestamp repeats, the row that came last in the payload wins.
    pub fn from_rows(rows: &[RawOhlcRow]) -> Result<Self, FetchError> {
        if rows.is_empty() {
            return Err(FetchError::data_shape("no OHLC data returned"));
        }

        let mut candles = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.iter().any(|v| !v.is_finite()) {
                return Err(FetchError::data_shape(format!(
                    "OHLC row {i} has a non-finite value"
                )));
            }

            let [ts_ms, open, high, low, close] = *row;
            let ts = DateTime::<Utc>::from_timestamp_millis(ts_ms as i64).ok_or_else(|| {
                FetchError::data_shape(format!("OHLC row {i} has an invalid timestamp {ts_ms}"))
            })?;

            candles.push(OhlcCandle {
                ts,
                open,
                high,
                low,
                close,
            });
        }

        // Stable, so equal timestamps keep payload order for the dedup below.
        candles.sort_by_key(|c| c.ts);

        let mut deduped: Vec<OhlcCandle> = Vec::with_capacity(candles.len());
        for c in candles {
            match deduped.last_mut() {
                Some(prev) if prev.ts == c.ts => *prev = c,
                _ => deduped.push(c),
            }
        }

        Ok(Self { candles: deduped })
    }

    pub fn candles(&self) -> &[OhlcCandle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&OhlcCandle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&OhlcCandle> {
        self.candles.last()
    }

    /// Lowest low and highest high across the series.
    pub fn price_range(&self) -> Option<(f64, f64)> {
        let first = self.candles.first()?;
        let init = (first.low, first.high);
        Some(
            self.candles
                .iter()
                .fold(init, |(lo, hi), c| (lo.min(c.low), hi.max(c.high))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: f64 = 86_400_000.0;

    fn row(day: u32, close: f64) -> RawOhlcRow {
        [1_700_000_000_000.0 + day as f64 * DAY_MS, close, close + 1.0, close - 1.0, close]
    }

    #[test]
    fn empty_payload_is_a_data_shape_error() {
        let err = OhlcSeries::from_rows(&[]).unwrap_err();
        assert!(err.is_data_shape());
    }

    #[test]
    fn rows_are_sorted_ascending() {
        let s = OhlcSeries::from_rows(&[row(2, 3.0), row(0, 1.0), row(1, 2.0)]).unwrap();
        let closes: Vec<f64> = s.candles().iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_timestamp_keeps_last_row() {
        let s = OhlcSeries::from_rows(&[row(0, 1.0), row(1, 2.0), row(1, 5.0)]).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.last().unwrap().close, 5.0);
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut bad = row(0, 1.0);
        bad[2] = f64::NAN;
        let err = OhlcSeries::from_rows(&[row(1, 1.0), bad]).unwrap_err();
        assert!(err.is_data_shape());
    }

    #[test]
    fn price_range_spans_all_candles() {
        let s = OhlcSeries::from_rows(&[row(0, 10.0), row(1, 20.0)]).unwrap();
        assert_eq!(s.price_range(), Some((9.0, 21.0)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]
        #[test]
        fn series_is_strictly_ascending(
            days in prop::collection::vec(0u32..400, 1..60)
        ) {
            let rows: Vec<RawOhlcRow> = days
                .iter()
                .map(|d| {
                    let ts = 1_600_000_000_000.0 + *d as f64 * 3_600_000.0;
                    [ts, 1.0, 2.0, 0.5, 1.5]
                })
                .collect();

            let series = OhlcSeries::from_rows(&rows).unwrap();

            // --- INVARIANT 1: strictly increasing timestamps (sorted, no dups) ---
            for w in series.candles().windows(2) {
                assert!(w[0].ts < w[1].ts);
            }

            // --- INVARIANT 2: one candle per distinct input timestamp ---
            let mut distinct = days.clone();
            distinct.sort_unstable();
            distinct.dedup();
            assert_eq!(series.len(), distinct.len());
        }
    }
}
