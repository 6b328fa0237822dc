//! Integration tests for the multi-timeframe scan and universe selection,
//! driven through the in-memory gateway.

use proptest::prelude::*;
use tribar_core::domain::{Side, Timeframe};
use tribar_core::exchange::{GatewayCall, InMemoryGateway, Ticker};
use tribar_core::pattern::{DetectorConfig, PatternDetector};
use tribar_core::scan::{scan_symbol, ScanPlan};
use tribar_core::synthetic::{flat_series, pattern_series, zigzag_series};
use tribar_core::universe::{rank_by_turnover, select_universe, UniverseMode, UniverseRequest};

// ── Helpers ──────────────────────────────────────────────────────────

fn tf(s: &str) -> Timeframe {
    s.parse().unwrap()
}

fn kline_intervals(gw: &InMemoryGateway) -> Vec<String> {
    gw.calls()
        .into_iter()
        .filter_map(|c| match c {
            GatewayCall::Klines { interval, .. } => Some(interval),
            _ => None,
        })
        .collect()
}

fn request(mode: UniverseMode, top_n: usize) -> UniverseRequest {
    UniverseRequest {
        category: "linear".into(),
        quote_suffix: "USDT".into(),
        top_n,
        mode,
        timeframe: tf("60"),
        vol_lookback: 20,
    }
}

// ── Scan ─────────────────────────────────────────────────────────────

#[test]
fn first_matching_timeframe_wins_and_later_ones_are_not_fetched() {
    let gw = InMemoryGateway::new()
        .with_klines("BTCUSDT", &tf("15"), flat_series(300, 50.0))
        .with_klines("BTCUSDT", &tf("60"), pattern_series(Side::Long, 300))
        .with_klines("BTCUSDT", &tf("240"), pattern_series(Side::Short, 300));
    let plan = ScanPlan {
        category: "linear".into(),
        timeframes: vec![tf("15"), tf("60"), tf("240")],
        candles_limit: 300,
    };
    let detector = PatternDetector::new(DetectorConfig::shape_only());

    let hit = scan_symbol(&gw, "BTCUSDT", &plan, &detector)
        .unwrap()
        .expect("hit on the hourly timeframe");
    assert_eq!(hit.signal.timeframe, tf("60"));
    assert_eq!(hit.signal.side, Side::Long);
    assert_eq!(hit.candles, 300);
    assert_eq!(kline_intervals(&gw), vec!["15", "60"]);
}

#[test]
fn scan_requests_the_configured_depth() {
    let gw = InMemoryGateway::new().with_klines("ETHUSDT", &tf("60"), pattern_series(Side::Long, 400));
    let plan = ScanPlan {
        category: "linear".into(),
        timeframes: vec![tf("60")],
        candles_limit: 250,
    };
    let detector = PatternDetector::new(DetectorConfig::shape_only());
    let hit = scan_symbol(&gw, "ETHUSDT", &plan, &detector).unwrap().unwrap();
    assert_eq!(hit.candles, 250);
    assert!(matches!(
        gw.calls()[0],
        GatewayCall::Klines { limit: 250, .. }
    ));
}

// ── Universe: turnover ───────────────────────────────────────────────

#[test]
fn turnover_universe_from_gateway() {
    let gw = InMemoryGateway::new()
        .with_ticker("BTCUSDT", Some(5_000.0))
        .with_ticker("ETHUSDT", Some(9_000.0))
        .with_ticker("SOLUSDC", Some(99_000.0))
        .with_ticker("XRPUSDT", None)
        .with_ticker("DOGEUSDT", Some(100.0));
    let symbols = select_universe(&gw, &request(UniverseMode::Turnover, 3)).unwrap();
    assert_eq!(symbols, vec!["ETHUSDT", "BTCUSDT", "DOGEUSDT"]);
    assert_eq!(gw.calls(), vec![GatewayCall::Tickers]);
}

#[test]
fn empty_tickers_make_an_empty_universe() {
    let gw = InMemoryGateway::new();
    assert!(select_universe(&gw, &request(UniverseMode::Volatility, 5))
        .unwrap()
        .is_empty());
}

#[test]
fn ticker_failure_propagates() {
    let gw = InMemoryGateway::new().fail_tickers(1);
    assert!(select_universe(&gw, &request(UniverseMode::Turnover, 5)).is_err());
}

fn arb_ticker() -> impl Strategy<Value = Ticker> {
    (
        "[A-Z]{2,5}",
        prop::sample::select(vec!["USDT", "USDC", "BTC"]),
        prop::option::of(0.0..1e9_f64),
    )
        .prop_map(|(base, quote, turnover)| Ticker {
            symbol: format!("{base}{quote}"),
            turnover_24h: turnover,
        })
}

proptest! {
    #[test]
    fn turnover_rank_is_bounded_sorted_and_filtered(
        tickers in prop::collection::vec(arb_ticker(), 0..40),
        top_n in 0usize..15,
    ) {
        let ranked = rank_by_turnover(&tickers, "USDT", top_n);
        prop_assert!(ranked.len() <= top_n);
        prop_assert!(ranked.iter().all(|t| t.symbol.ends_with("USDT")));
        for pair in ranked.windows(2) {
            match (pair[0].turnover_24h, pair[1].turnover_24h) {
                (Some(a), Some(b)) => prop_assert!(a >= b),
                (None, Some(_)) => prop_assert!(false, "missing turnover ranked ahead"),
                _ => {}
            }
        }
    }
}

// ── Universe: volatility ─────────────────────────────────────────────

#[test]
fn volatility_ranks_liquid_candidates_by_std() {
    let hour = tf("60");
    let gw = InMemoryGateway::new()
        .with_ticker("AUSDT", Some(100.0))
        .with_ticker("BUSDT", Some(90.0))
        .with_ticker("CUSDT", Some(80.0))
        .with_ticker("DUSDT", Some(1.0))
        .with_klines("AUSDT", &hour, zigzag_series(100, 10.0, 0.01))
        .with_klines("BUSDT", &hour, zigzag_series(100, 10.0, 0.05))
        .with_klines("CUSDT", &hour, zigzag_series(100, 10.0, 0.03))
        .with_klines("DUSDT", &hour, zigzag_series(100, 10.0, 0.5));

    let symbols = select_universe(&gw, &request(UniverseMode::Volatility, 2)).unwrap();
    // DUSDT is the most volatile but falls outside the 3-symbol liquidity pre-filter.
    assert_eq!(symbols, vec!["BUSDT", "CUSDT"]);

    let fetched: Vec<_> = gw
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            GatewayCall::Klines { symbol, limit, .. } => Some((symbol, limit)),
            _ => None,
        })
        .collect();
    assert_eq!(
        fetched,
        vec![
            ("AUSDT".to_string(), 50),
            ("BUSDT".to_string(), 50),
            ("CUSDT".to_string(), 50),
        ]
    );
}

#[test]
fn volatility_drops_short_histories() {
    let hour = tf("60");
    let gw = InMemoryGateway::new()
        .with_ticker("AUSDT", Some(100.0))
        .with_ticker("BUSDT", Some(90.0))
        .with_klines("AUSDT", &hour, zigzag_series(10, 10.0, 0.5))
        .with_klines("BUSDT", &hour, zigzag_series(100, 10.0, 0.01));
    let symbols = select_universe(&gw, &request(UniverseMode::Volatility, 2)).unwrap();
    assert_eq!(symbols, vec!["BUSDT"]);
}
