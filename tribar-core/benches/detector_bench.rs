//! Criterion benchmarks for the detection hot path.
//!
//! Benchmarks:
//! 1. Indicator computation (EMA, RSI, MACD, ATR, full snapshot) over a scan-depth series
//! 2. Full detection with every filter on, for several series lengths
//! 3. `detect_any` on a series with no pattern (both sides rejected)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tribar_core::domain::{Side, Timeframe};
use tribar_core::indicators::{atr_of_candles, ema_of_series, macd_of_series, rsi_of_series};
use tribar_core::pattern::{indicator_snapshot, DetectorConfig, PatternDetector};
use tribar_core::synthetic::{pattern_series, zigzag_series};

fn bench_indicators(c: &mut Criterion) {
    let series = pattern_series(Side::Long, 300);
    let closes = series.closes();
    let mut group = c.benchmark_group("indicators");
    group.bench_function("ema_200", |b| b.iter(|| ema_of_series(black_box(&closes), 200)));
    group.bench_function("rsi_14", |b| b.iter(|| rsi_of_series(black_box(&closes), 14)));
    group.bench_function("macd_12_26_9", |b| {
        b.iter(|| macd_of_series(black_box(&closes), 12, 26, 9))
    });
    group.bench_function("atr_14", |b| {
        b.iter(|| atr_of_candles(black_box(series.candles()), 14))
    });
    let cfg = DetectorConfig::default();
    group.bench_function("snapshot", |b| {
        b.iter(|| indicator_snapshot(&cfg, black_box(series.candles())))
    });
    group.finish();
}

fn bench_detect(c: &mut Criterion) {
    let tf: Timeframe = "60".parse().unwrap();
    let detector = PatternDetector::new(DetectorConfig::default());
    let mut group = c.benchmark_group("detect");
    for len in [250usize, 500, 1000] {
        let series = pattern_series(Side::Long, len);
        group.bench_with_input(BenchmarkId::new("long_hit", len), &series, |b, s| {
            b.iter(|| detector.detect("BTCUSDT", &tf, black_box(s), Side::Long))
        });
    }
    let miss = zigzag_series(300, 100.0, 0.02);
    group.bench_function("detect_any_miss", |b| {
        b.iter(|| detector.detect_any("BTCUSDT", &tf, black_box(&miss)))
    });
    group.finish();
}

criterion_group!(benches, bench_indicators, bench_detect);
criterion_main!(benches);
