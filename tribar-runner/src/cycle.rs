//! One scan cycle: universe → per-symbol sweep + detect → alert, persist, admit, place → report.
//!
//! The sweep and detect phase may run on a bounded rayon pool. Everything that
//! talks to the notifier or commits capital runs afterwards, sequentially and
//! in universe order, so the per-symbol sequence sweep → detect → admit →
//! place → attach is preserved regardless of the worker count.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use tribar_core::domain::PatternSignal;
use tribar_core::exchange::{ExchangeGateway, GatewayError};
use tribar_core::guard::{self, SweepReport};
use tribar_core::pattern::PatternDetector;
use tribar_core::scan::{scan_symbol, ScanHit, ScanPlan};
use tribar_core::trade::{open_trade, PlacedEntry, TradeOutcome};
use tribar_core::universe::select_universe;

use crate::config::{AppConfig, RunId};
use crate::journal::SignalJournal;
use crate::notify::{send_best_effort, Channel, Notifier};
use crate::report;
use crate::store::SignalStore;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("universe selection failed: {0}")]
    Universe(#[source] GatewayError),
    #[error("{symbol}: {source}")]
    Symbol {
        symbol: String,
        #[source]
        source: GatewayError,
    },
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

impl CycleError {
    fn symbol(symbol: &str, source: GatewayError) -> Self {
        Self::Symbol {
            symbol: symbol.to_string(),
            source,
        }
    }
}

/// Borrowed collaborators for a cycle.
#[derive(Clone, Copy)]
pub struct CycleContext<'a> {
    pub config: &'a AppConfig,
    pub gateway: &'a dyn ExchangeGateway,
    pub notifier: &'a dyn Notifier,
    pub store: Option<&'a dyn SignalStore>,
    pub journal: Option<&'a SignalJournal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub universe: usize,
    /// Signals alerted this cycle (after duplicate suppression), in universe order.
    pub signals: Vec<PatternSignal>,
    /// Signals dropped because the store already had them within the dedup window.
    pub suppressed: usize,
    pub placed: Vec<PlacedEntry>,
    pub not_admitted: usize,
    pub stale_cancelled: usize,
    pub persisted: usize,
}

struct SymbolScan {
    symbol: String,
    sweep: Option<SweepReport>,
    hit: Option<ScanHit>,
}

fn sweep_and_scan(
    ctx: &CycleContext<'_>,
    symbol: &str,
    plan: &ScanPlan,
    detector: &PatternDetector,
    now: DateTime<Utc>,
) -> Result<SymbolScan, CycleError> {
    let config = ctx.config;
    // Listing open orders is a private call; without auto-trade there are no keys.
    let sweep = if config.trading.auto_trade {
        Some(
            guard::expire_stale(
                ctx.gateway,
                &config.exchange.category,
                symbol,
                config.order_ttl(),
                now,
            )
            .map_err(|e| CycleError::symbol(symbol, e))?,
        )
    } else {
        None
    };
    let hit = scan_symbol(ctx.gateway, symbol, plan, detector)
        .map_err(|e| CycleError::symbol(symbol, e))?;
    Ok(SymbolScan {
        symbol: symbol.to_string(),
        sweep,
        hit,
    })
}

fn scan_universe(
    ctx: &CycleContext<'_>,
    universe: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<SymbolScan>, CycleError> {
    let plan = ctx.config.scan_plan();
    let detector = ctx.config.detector();
    let workers = ctx.config.scan.workers;

    let results: Vec<Result<SymbolScan, CycleError>> = if workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CycleError::Pool(e.to_string()))?;
        pool.install(|| {
            universe
                .par_iter()
                .map(|s| sweep_and_scan(ctx, s, &plan, &detector, now))
                .collect()
        })
    } else {
        universe
            .iter()
            .map(|s| sweep_and_scan(ctx, s, &plan, &detector, now))
            .collect()
    };
    // First failure in universe order, independent of scheduling.
    results.into_iter().collect()
}

fn is_duplicate(ctx: &CycleContext<'_>, signal: &PatternSignal, now: DateTime<Utc>) -> bool {
    let hours = ctx.config.store.dedup_hours;
    let Some(store) = ctx.store.filter(|_| hours > 0) else {
        return false;
    };
    match store.has_recent_signal(
        &signal.symbol,
        &signal.timeframe,
        Some(signal.side),
        hours,
        now,
    ) {
        Ok(seen) => seen,
        Err(e) => {
            tracing::warn!(symbol = %signal.symbol, error = %e, "dedup lookup failed, alerting anyway");
            false
        }
    }
}

/// Audit row for one alerted signal in the store and the CSV journal.
fn persist(
    ctx: &CycleContext<'_>,
    run_id: &str,
    signal: &PatternSignal,
    now: DateTime<Utc>,
) -> usize {
    let signals = std::slice::from_ref(signal);
    let mut persisted = 0;
    if let Some(store) = ctx.store {
        match store.append_signals(run_id, signals, now) {
            Ok(n) => persisted = n,
            Err(e) => tracing::warn!(error = %e, "failed to store signals"),
        }
    }
    if let Some(journal) = ctx.journal {
        if let Err(e) = journal.append(run_id, signals, now) {
            tracing::warn!(path = %journal.path().display(), error = %e, "failed to journal signals");
        }
    }
    persisted
}

/// Run one full cycle at `now`.
///
/// Gateway errors abort the cycle. Each signal is persisted as soon as it is
/// alerted, so an abort keeps the audit rows (and dedup state) of the signals
/// before it. Notification and persistence failures are logged and skipped.
pub fn run_cycle(ctx: &CycleContext<'_>, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
    let config = ctx.config;
    let run_id = config.run_id(now);

    let universe =
        select_universe(ctx.gateway, &config.universe_request()).map_err(CycleError::Universe)?;
    tracing::info!(
        run_id = %run_id,
        symbols = universe.len(),
        mode = %config.universe.mode,
        "universe selected"
    );

    let scans = scan_universe(ctx, &universe, now)?;

    let mut summary = CycleReport {
        run_id,
        started_at: now,
        universe: universe.len(),
        signals: Vec::new(),
        suppressed: 0,
        placed: Vec::new(),
        not_admitted: 0,
        stale_cancelled: 0,
        persisted: 0,
    };
    let settings = config.trade_settings();

    for scan in scans {
        if let Some(sweep) = &scan.sweep {
            summary.stale_cancelled += sweep.cancelled.len();
        }
        let Some(hit) = scan.hit else { continue };
        let signal = hit.signal;

        if is_duplicate(ctx, &signal, now) {
            tracing::info!(symbol = %scan.symbol, side = %signal.side, timeframe = %signal.timeframe, "duplicate signal suppressed");
            summary.suppressed += 1;
            continue;
        }

        tracing::info!(
            symbol = %scan.symbol,
            side = %signal.side,
            timeframe = %signal.timeframe,
            entry = signal.entry_close,
            stop_loss = signal.stop_loss,
            take_profit = signal.take_profit,
            "pattern signal"
        );
        if config.notify.signal_alerts {
            send_best_effort(
                ctx.notifier,
                &report::quick_alert(&signal, settings.entry_mode),
                Channel::Signal,
            );
        }
        summary.persisted += persist(ctx, &summary.run_id, &signal, now);

        if config.trading.auto_trade {
            match open_trade(ctx.gateway, &signal, &settings, Utc::now())
                .map_err(|e| CycleError::symbol(&scan.symbol, e))?
            {
                TradeOutcome::Placed(entry) => {
                    send_best_effort(
                        ctx.notifier,
                        &report::placed_message(&signal, &entry),
                        Channel::Main,
                    );
                    summary.placed.push(entry);
                }
                TradeOutcome::NotAdmitted => {
                    tracing::info!(symbol = %scan.symbol, "exposure cap reached, no entry");
                    summary.not_admitted += 1;
                }
            }
        }
        summary.signals.push(signal);
    }

    if config.notify.cycle_report {
        send_best_effort(ctx.notifier, &report::cycle_report(&summary.signals), Channel::Main);
    }

    tracing::info!(
        universe = summary.universe,
        signals = summary.signals.len(),
        suppressed = summary.suppressed,
        placed = summary.placed.len(),
        not_admitted = summary.not_admitted,
        stale_cancelled = summary.stale_cancelled,
        "scan complete"
    );
    Ok(summary)
}
