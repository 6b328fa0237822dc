//! Deterministic synthetic candle series.
//!
//! Used by tests, benchmarks and the CLI `detect --synthetic` dry run. The
//! pattern series is a gently trending zig-zag (so RSI sits mid-band and the
//! MACD histogram hovers near zero) finished by three strong candles in the
//! trend direction.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Candle, CandleSeries, Side};

/// 2024-01-01T00:00:00Z
const BASE_TS: i64 = 1_704_067_200;
const BASE_VOLUME: f64 = 1000.0;

fn start_at(i: usize) -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_TS, 0).unwrap_or_default() + Duration::hours(i as i64)
}

fn plain_candle(i: usize, open: f64, close: f64, volume: f64) -> Candle {
    Candle {
        start: start_at(i),
        open,
        high: open.max(close) + 0.2,
        low: open.min(close) - 0.2,
        close,
        volume,
        turnover: volume * close,
    }
}

/// `len` candles ending in Three White Soldiers (LONG) or Three Black Crows (SHORT).
///
/// Pattern candles have bodies of 80% of their range and a 5% opposing wick,
/// each closing 0.6 beyond the previous close; the last candle trades 1.2x the
/// base volume.
pub fn pattern_series(side: Side, len: usize) -> CandleSeries {
    let len = len.max(4);
    let base_len = len - 3;
    let dir = match side {
        Side::Long => 1.0,
        Side::Short => -1.0,
    };
    let anchor = match side {
        Side::Long => 100.0,
        Side::Short => 200.0,
    };

    let mut candles = Vec::with_capacity(len);
    let mut prev_close = anchor;
    for i in 0..base_len {
        let swing = if i % 2 == 1 { 0.9 } else { 0.0 };
        let close = anchor + dir * (0.1 * i as f64 + swing);
        let open = if i == 0 { close } else { prev_close };
        candles.push(plain_candle(i, open, close, BASE_VOLUME));
        prev_close = close;
    }

    for k in 0..3 {
        let i = base_len + k;
        let close = prev_close + dir * 0.6;
        let open = close - dir * 0.5;
        let range = 0.625;
        let (high, low) = match side {
            Side::Long => (close + 0.05 * range, open - 0.15 * range),
            Side::Short => (open + 0.15 * range, close - 0.05 * range),
        };
        let volume = if k == 2 { 1.2 * BASE_VOLUME } else { BASE_VOLUME };
        candles.push(Candle {
            start: start_at(i),
            open,
            high,
            low,
            close,
            volume,
            turnover: volume * close,
        });
        prev_close = close;
    }

    CandleSeries::new(candles).unwrap_or_default()
}

/// Append a still-forming doji at the last close.
pub fn with_forming_candle(series: &CandleSeries) -> CandleSeries {
    let mut candles = series.candles().to_vec();
    if let Some(last) = candles.last() {
        let next = plain_candle(candles.len(), last.close, last.close, BASE_VOLUME);
        candles.push(next);
    }
    CandleSeries::new(candles).unwrap_or_default()
}

/// `len` doji candles around `price`: never forms a pattern.
pub fn flat_series(len: usize, price: f64) -> CandleSeries {
    let candles = (0..len)
        .map(|i| plain_candle(i, price, price, BASE_VOLUME))
        .collect();
    CandleSeries::new(candles).unwrap_or_default()
}

/// Series alternating between `price` and `price * e^step`.
///
/// Realized volatility of log returns grows with `step`.
pub fn zigzag_series(len: usize, price: f64, step: f64) -> CandleSeries {
    let mut candles = Vec::with_capacity(len);
    let mut prev = price;
    for i in 0..len {
        let close = if i % 2 == 0 { price } else { price * step.exp() };
        candles.push(plain_candle(i, prev, close, BASE_VOLUME));
        prev = close;
    }
    CandleSeries::new(candles).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_series_has_requested_length_and_order() {
        let s = pattern_series(Side::Long, 70);
        assert_eq!(s.len(), 70);
        let closes = s.closes();
        assert!(closes[69] > closes[68] && closes[68] > closes[67]);
        assert!((closes[69] - 108.4).abs() < 1e-9);
    }

    #[test]
    fn short_series_mirrors() {
        let s = pattern_series(Side::Short, 70);
        let closes = s.closes();
        assert!(closes[69] < closes[68] && closes[68] < closes[67]);
    }

    #[test]
    fn forming_candle_extends_series() {
        let s = with_forming_candle(&pattern_series(Side::Long, 70));
        assert_eq!(s.len(), 71);
        assert_eq!(s.candles()[70].open, s.candles()[70].close);
    }
}
