//! Three White Soldiers / Three Black Crows detection.
//!
//! The detector is a pure function of the candle series and the configuration:
//! no randomness, no hidden state. Every failed check is reported as a
//! [`Rejection`] so callers can log why a symbol produced nothing; `detect`
//! collapses that into `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::thresholds::{DetectorConfig, SideThresholds};
use crate::domain::{Candle, CandleSeries, IndicatorSnapshot, PatternSignal, Side, Timeframe};
use crate::indicators::{Atr, Ema, Indicator, Macd, Rsi};

/// Candles required before detection is attempted.
pub const MIN_HISTORY: usize = 60;

/// Range floor for zero-range candles.
const RANGE_EPSILON: f64 = 1e-12;

/// Why a series did not produce a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    InsufficientHistory { len: usize },
    WrongDirection { index: usize },
    WeakBody { index: usize, ratio: f64 },
    LongWick { index: usize, ratio: f64 },
    ClosesNotMonotonic,
    TrendDisagrees { ema_fast: f64, ema_slow: f64 },
    RsiOutOfBand { rsi: f64 },
    MacdAgainst { histogram: f64 },
    LowVolume { last: f64, mean: f64 },
    AtrUnavailable,
    LevelsUnordered,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InsufficientHistory { len } => write!(f, "insufficient history ({len} candles)"),
            Rejection::WrongDirection { index } => write!(f, "candle {index} has the wrong direction"),
            Rejection::WeakBody { index, ratio } => write!(f, "candle {index} body ratio {ratio:.3}"),
            Rejection::LongWick { index, ratio } => write!(f, "candle {index} wick ratio {ratio:.3}"),
            Rejection::ClosesNotMonotonic => write!(f, "closes not monotonic"),
            Rejection::TrendDisagrees { ema_fast, ema_slow } => {
                write!(f, "trend filter: ema_fast={ema_fast:.4} ema_slow={ema_slow:.4}")
            }
            Rejection::RsiOutOfBand { rsi } => write!(f, "rsi {rsi:.2} outside band"),
            Rejection::MacdAgainst { histogram } => write!(f, "macd histogram {histogram:.6}"),
            Rejection::LowVolume { last, mean } => write!(f, "volume {last:.2} vs mean {mean:.2}"),
            Rejection::AtrUnavailable => write!(f, "atr unavailable"),
            Rejection::LevelsUnordered => write!(f, "derived levels out of order"),
        }
    }
}

/// Detects the three-candle reversal patterns under a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector {
    config: DetectorConfig,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect the pattern for one side; `None` when any check fails.
    pub fn detect(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        series: &CandleSeries,
        side: Side,
    ) -> Option<PatternSignal> {
        self.evaluate(symbol, timeframe, series, side).ok()
    }

    /// Try LONG first, then SHORT.
    pub fn detect_any(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        series: &CandleSeries,
    ) -> Option<PatternSignal> {
        [Side::Long, Side::Short].into_iter().find_map(|side| {
            match self.evaluate(symbol, timeframe, series, side) {
                Ok(signal) => Some(signal),
                Err(reason) => {
                    tracing::trace!(%symbol, %timeframe, %side, %reason, "no pattern");
                    None
                }
            }
        })
    }

    /// Full evaluation with the reason for rejection.
    pub fn evaluate(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        series: &CandleSeries,
        side: Side,
    ) -> Result<PatternSignal, Rejection> {
        let cfg = &self.config;
        let candles = series.candles();
        let n = candles.len();
        if n < MIN_HISTORY {
            return Err(Rejection::InsufficientHistory { len: n });
        }

        // Relaxation is applied once, before any candle is looked at.
        let thresholds = cfg.thresholds(side);
        let window = pattern_window(candles, cfg.include_forming);

        for (index, candle) in window.iter().enumerate() {
            check_shape(candle, index, side, &thresholds)?;
        }
        let monotonic = match side {
            Side::Long => window[1].close > window[0].close && window[2].close > window[1].close,
            Side::Short => window[1].close < window[0].close && window[2].close < window[1].close,
        };
        if !monotonic {
            return Err(Rejection::ClosesNotMonotonic);
        }

        let snapshot = indicator_snapshot(cfg, candles);
        let IndicatorSnapshot {
            ema_fast,
            ema_slow,
            rsi,
            macd_histogram: histogram,
            atr,
        } = snapshot;

        if cfg.use_ema {
            // NaN compares false, so a slow EMA still in warmup fails closed.
            let agrees = match side {
                Side::Long => ema_fast > ema_slow,
                Side::Short => ema_fast < ema_slow,
            };
            if !agrees {
                return Err(Rejection::TrendDisagrees { ema_fast, ema_slow });
            }
        }

        if cfg.use_rsi && !(thresholds.rsi_min <= rsi && rsi <= thresholds.rsi_max) {
            return Err(Rejection::RsiOutOfBand { rsi });
        }

        if cfg.use_macd && !macd_confirms(side, histogram, cfg.macd_tolerance) {
            return Err(Rejection::MacdAgainst { histogram });
        }

        if cfg.use_volume {
            check_volume(candles, cfg.vol_window, cfg.vol_min_ratio)?;
        }

        if atr.is_nan() || atr <= 0.0 {
            return Err(Rejection::AtrUnavailable);
        }

        let entry_close = window[2].close;
        let entry_retest = window[1].body_mid();
        let (stop_loss, take_profit) = match side {
            Side::Long => (
                window[1].low.min(entry_close - cfg.sl_atr_mult * atr),
                entry_close + cfg.tp_atr_mult * atr,
            ),
            Side::Short => (
                window[1].high.max(entry_close + cfg.sl_atr_mult * atr),
                entry_close - cfg.tp_atr_mult * atr,
            ),
        };

        let signal = PatternSignal {
            side,
            symbol: symbol.to_string(),
            timeframe: timeframe.clone(),
            entry_close,
            entry_retest,
            stop_loss,
            take_profit,
            atr: snapshot.atr,
            ema_fast: snapshot.ema_fast,
            ema_slow: snapshot.ema_slow,
            rsi: snapshot.rsi,
            macd_histogram: snapshot.macd_histogram,
        };
        if !signal.levels_ordered() {
            return Err(Rejection::LevelsUnordered);
        }
        Ok(signal)
    }
}

/// Indicator values at the last candle of `candles`.
///
/// Values still in warmup are NaN, which every filter comparison rejects.
pub fn indicator_snapshot(cfg: &DetectorConfig, candles: &[Candle]) -> IndicatorSnapshot {
    let at_last = |indicator: &dyn Indicator| {
        if candles.len() <= indicator.lookback() {
            tracing::trace!(indicator = indicator.name(), len = candles.len(), "in warmup");
        }
        indicator.compute(candles).last().copied().unwrap_or(f64::NAN)
    };
    IndicatorSnapshot {
        ema_fast: at_last(&Ema::new(cfg.ema_fast)),
        ema_slow: at_last(&Ema::new(cfg.ema_slow)),
        rsi: at_last(&Rsi::new(cfg.rsi_length)),
        macd_histogram: at_last(&Macd::default()),
        atr: at_last(&Atr::new(cfg.atr_length)),
    }
}

/// MACD filter with a tolerance band around zero.
///
/// LONG passes while the histogram is above `-tolerance`, SHORT while it is
/// below `+tolerance`; both bounds are strict.
pub fn macd_confirms(side: Side, histogram: f64, tolerance: f64) -> bool {
    match side {
        Side::Long => histogram > -tolerance,
        Side::Short => histogram < tolerance,
    }
}

/// The three candles under evaluation.
///
/// With `include_forming` the last three; otherwise the three ending one before
/// the last. Callers guarantee at least four candles.
pub fn pattern_window(candles: &[Candle], include_forming: bool) -> &[Candle] {
    let n = candles.len();
    if include_forming || n < 4 {
        &candles[n.saturating_sub(3)..]
    } else {
        &candles[n - 4..n - 1]
    }
}

fn check_shape(
    candle: &Candle,
    index: usize,
    side: Side,
    thresholds: &SideThresholds,
) -> Result<(), Rejection> {
    let directional = match side {
        Side::Long => candle.close > candle.open,
        Side::Short => candle.close < candle.open,
    };
    if !directional {
        return Err(Rejection::WrongDirection { index });
    }

    let range = candle.range().max(RANGE_EPSILON);
    let body_ratio = candle.body() / range;
    if body_ratio < thresholds.min_body_ratio {
        return Err(Rejection::WeakBody { index, ratio: body_ratio });
    }

    let wick = match side {
        Side::Long => candle.upper_wick(),
        Side::Short => candle.lower_wick(),
    };
    let wick_ratio = wick / range;
    if wick_ratio > thresholds.max_wick_ratio {
        return Err(Rejection::LongWick { index, ratio: wick_ratio });
    }
    Ok(())
}

/// Last volume against the mean of the trailing window (which includes it).
/// A non-positive mean skips the filter.
fn check_volume(candles: &[Candle], window: usize, min_ratio: f64) -> Result<(), Rejection> {
    let start = candles.len().saturating_sub(window.max(1));
    let tail = &candles[start..];
    let mean = tail.iter().map(|c| c.volume).sum::<f64>() / tail.len() as f64;
    if mean <= 0.0 {
        return Ok(());
    }
    let last = tail[tail.len() - 1].volume;
    if last < min_ratio * mean {
        return Err(Rejection::LowVolume { last, mean });
    }
    Ok(())
}
