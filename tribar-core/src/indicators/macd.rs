//! Moving Average Convergence Divergence (MACD).
//!
//! MACD line = EMA(fast) - EMA(slow); signal = EMA(MACD line, signal);
//! histogram = MACD line - signal. The signal EMA seeds on the first `signal`
//! defined MACD values, so the first histogram value sits at index
//! `slow + signal - 2`.

use super::ema::ema_of_series;
use super::Indicator;
use crate::domain::Candle;

/// Full MACD output, each series aligned to the input length.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd_of_series(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let fast_ema = ema_of_series(values, fast);
    let slow_ema = ema_of_series(values, slow);
    let macd: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&macd, signal);
    let histogram = macd.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    MacdOutput {
        macd,
        signal: signal_line,
        histogram,
    }
}

/// MACD histogram as a single-series indicator.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_hist_{fast}_{slow}_{signal}"),
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        (self.slow.max(self.fast) + self.signal).saturating_sub(2)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        macd_of_series(&closes, self.fast, self.slow, self.signal).histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn linear_trend_has_zero_histogram() {
        // On a straight line both EMAs lag by a constant, so MACD is constant and
        // the signal line equals it exactly.
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + 0.5 * i as f64).collect();
        let out = macd_of_series(&closes, 12, 26, 9);
        assert_approx(out.macd[79], 0.5 * (12.5 - 5.5), 1e-9);
        assert_approx(out.histogram[79], 0.0, 1e-9);
    }

    #[test]
    fn first_defined_histogram_index() {
        let closes: Vec<f64> = (0..60).map(|i| (i as f64 * 0.3).sin() + 50.0).collect();
        let out = macd_of_series(&closes, 12, 26, 9);
        assert!(out.histogram[32].is_nan());
        assert!(!out.histogram[33].is_nan());
        assert_eq!(Macd::default().lookback(), 33);
    }

    #[test]
    fn acceleration_turns_histogram_positive() {
        let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.1 * i as f64).collect();
        let last = *closes.last().unwrap();
        closes.extend([last + 1.0, last + 2.5, last + 4.5]);
        let hist = Macd::default().compute(&make_candles(&closes));
        assert!(hist.last().copied().unwrap() > 0.0);
    }
}
