//! Tribar Core — candle domain, indicators, pattern detection, universe and trade guard.
//!
//! This crate contains everything a scan cycle needs apart from configuration,
//! persistence and alerting:
//! - Domain types (candles, timeframes, pattern signals)
//! - Indicator library (EMA, RSI, MACD, ATR, log-return volatility)
//! - Three White Soldiers / Three Black Crows detector with derived levels
//! - Universe selection by turnover or realized volatility
//! - Multi-timeframe first-match scan
//! - Trade guard (exposure cap, stale-order sweep) and entry placement
//! - Exchange gateway trait with Bybit and in-memory implementations

pub mod domain;
pub mod exchange;
pub mod guard;
pub mod indicators;
pub mod pattern;
pub mod scan;
pub mod synthetic;
pub mod trade;
pub mod universe;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared with the runner's worker pool is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::CandleSeries>();
        require_sync::<domain::CandleSeries>();
        require_send::<domain::PatternSignal>();
        require_sync::<domain::PatternSignal>();
        require_send::<domain::Timeframe>();
        require_sync::<domain::Timeframe>();

        require_send::<pattern::PatternDetector>();
        require_sync::<pattern::PatternDetector>();
        require_send::<pattern::DetectorConfig>();
        require_sync::<pattern::DetectorConfig>();

        require_send::<scan::ScanPlan>();
        require_sync::<scan::ScanPlan>();
        require_send::<scan::ScanHit>();
        require_sync::<scan::ScanHit>();

        require_send::<exchange::BybitGateway>();
        require_sync::<exchange::BybitGateway>();
        require_send::<exchange::InMemoryGateway>();
        require_sync::<exchange::InMemoryGateway>();
        require_send::<exchange::CircuitBreaker>();
        require_sync::<exchange::CircuitBreaker>();
    }

    /// Architecture contract: the detector never sees the exchange.
    ///
    /// `evaluate()` takes a symbol, a timeframe, a candle series and a side. If a
    /// gateway parameter is ever added this stops compiling.
    #[test]
    fn detector_has_no_gateway_parameter() {
        fn _check(
            detector: &pattern::PatternDetector,
            series: &domain::CandleSeries,
            tf: &domain::Timeframe,
        ) -> Option<domain::PatternSignal> {
            detector.detect("X", tf, series, domain::Side::Long)
        }
    }
}
