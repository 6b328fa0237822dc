//! Candles and the ordered series built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for a single symbol in a single time bucket.
///
/// `start` is the opening time of the bucket. Once observed, a candle is never
/// mutated; the still-forming candle is simply replaced on the next fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

impl Candle {
    /// Returns true if any OHLC field is NaN (void candle).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Full high-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Absolute body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Midpoint of the body (used as the retest entry).
    pub fn body_mid(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

/// Errors raised while building a candle series.
#[derive(Debug, Error, PartialEq)]
pub enum CandleError {
    #[error("duplicate candle timestamp {0}")]
    DuplicateTimestamp(DateTime<Utc>),

    #[error("candle timestamps out of order at index {index}")]
    OutOfOrder { index: usize },
}

/// Ordered candles for one (symbol, timeframe).
///
/// Invariant: strictly increasing `start` timestamps, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from candles that are already oldest-first.
    pub fn new(candles: Vec<Candle>) -> Result<Self, CandleError> {
        for (i, pair) in candles.windows(2).enumerate() {
            if pair[1].start == pair[0].start {
                return Err(CandleError::DuplicateTimestamp(pair[1].start));
            }
            if pair[1].start < pair[0].start {
                return Err(CandleError::OutOfOrder { index: i + 1 });
            }
        }
        Ok(Self { candles })
    }

    /// Build a series from candles in any order (exchanges often return newest-first).
    ///
    /// Sorts ascending by start time; duplicates are still rejected.
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Result<Self, CandleError> {
        candles.sort_by_key(|c| c.start);
        Self::new(candles)
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}
