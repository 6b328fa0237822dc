//! Multi-timeframe scan of a single symbol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PatternSignal, Timeframe};
use crate::exchange::{ExchangeGateway, GatewayError};
use crate::pattern::PatternDetector;

pub const DEFAULT_CANDLES_LIMIT: usize = 300;

/// Where and how deep to look for a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPlan {
    pub category: String,
    /// Priority order: the first timeframe with a pattern wins.
    pub timeframes: Vec<Timeframe>,
    pub candles_limit: usize,
}

/// A pattern found on one timeframe of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHit {
    pub signal: PatternSignal,
    /// Start of the newest candle in the evaluated series.
    pub as_of: Option<DateTime<Utc>>,
    pub candles: usize,
}

/// Walk the plan's timeframes in order and stop at the first pattern.
///
/// Later timeframes are never fetched once one matches. A gateway error on any
/// timeframe aborts the search for this symbol.
pub fn scan_symbol(
    gateway: &dyn ExchangeGateway,
    symbol: &str,
    plan: &ScanPlan,
    detector: &PatternDetector,
) -> Result<Option<ScanHit>, GatewayError> {
    plan.timeframes
        .iter()
        .map(|tf| -> Result<Option<ScanHit>, GatewayError> {
            let series = gateway.klines(&plan.category, symbol, tf, plan.candles_limit)?;
            let hit = detector.detect_any(symbol, tf, &series).map(|signal| ScanHit {
                signal,
                as_of: series.last().map(|c| c.start),
                candles: series.len(),
            });
            tracing::debug!(
                %symbol,
                timeframe = %tf,
                candles = series.len(),
                matched = hit.is_some(),
                "timeframe scanned"
            );
            Ok(hit)
        })
        .find_map(Result::transpose)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::exchange::{GatewayCall, InMemoryGateway};
    use crate::pattern::DetectorConfig;
    use crate::synthetic::{flat_series, pattern_series};

    fn tf(s: &str) -> Timeframe {
        s.parse().unwrap()
    }

    #[test]
    fn no_timeframes_means_no_hit_and_no_calls() {
        let gw = InMemoryGateway::new();
        let plan = ScanPlan {
            category: "linear".into(),
            timeframes: vec![],
            candles_limit: 300,
        };
        let detector = PatternDetector::new(DetectorConfig::shape_only());
        assert!(scan_symbol(&gw, "BTCUSDT", &plan, &detector).unwrap().is_none());
        assert!(gw.calls().is_empty());
    }

    #[test]
    fn error_stops_the_search() {
        let gw = InMemoryGateway::new()
            .with_klines("BTCUSDT", &tf("240"), pattern_series(Side::Long, 80))
            .fail_klines_for("BTCUSDT");
        let plan = ScanPlan {
            category: "linear".into(),
            timeframes: vec![tf("60"), tf("240")],
            candles_limit: 300,
        };
        let detector = PatternDetector::new(DetectorConfig::shape_only());
        assert!(scan_symbol(&gw, "BTCUSDT", &plan, &detector).is_err());
        assert_eq!(gw.calls().len(), 1);
    }

    #[test]
    fn miss_on_every_timeframe_visits_all() {
        let gw = InMemoryGateway::new()
            .with_klines("BTCUSDT", &tf("60"), flat_series(100, 5.0))
            .with_klines("BTCUSDT", &tf("240"), flat_series(100, 5.0));
        let plan = ScanPlan {
            category: "linear".into(),
            timeframes: vec![tf("60"), tf("240")],
            candles_limit: 300,
        };
        let detector = PatternDetector::new(DetectorConfig::shape_only());
        assert!(scan_symbol(&gw, "BTCUSDT", &plan, &detector).unwrap().is_none());
        let intervals: Vec<_> = gw
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Klines { interval, .. } => Some(interval),
                _ => None,
            })
            .collect();
        assert_eq!(intervals, vec!["60", "240"]);
    }
}
