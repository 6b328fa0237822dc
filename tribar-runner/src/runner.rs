//! Wiring and the run loop.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

use tribar_core::exchange::{BybitGateway, ExchangeGateway, GatewayError};

use crate::config::{AppConfig, RunMode};
use crate::cycle::{run_cycle, CycleContext, CycleError, CycleReport};
use crate::journal::SignalJournal;
use crate::notify::{notifier_from_config, send_best_effort, Channel, Notifier};
use crate::report;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{SignalStore, SqliteSignalStore, StoreError};

/// Granularity of the stop-flag check while sleeping between cycles.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("exchange client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("signal store: {0}")]
    Store(#[from] StoreError),
}

/// Totals over a run loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed: usize,
    pub signals: usize,
    pub placed: usize,
    pub last_error: Option<String>,
}

pub struct Runner {
    config: AppConfig,
    gateway: Box<dyn ExchangeGateway>,
    notifier: Box<dyn Notifier>,
    store: Option<Box<dyn SignalStore>>,
    journal: Option<SignalJournal>,
}

impl Runner {
    /// A runner with no store and no journal.
    pub fn new(
        config: AppConfig,
        gateway: Box<dyn ExchangeGateway>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            gateway,
            notifier,
            store: None,
            journal: None,
        }
    }

    /// Bybit gateway, notifier and persistence as the configuration describes.
    pub fn from_config(config: AppConfig) -> Result<Self, RunnerError> {
        let gateway = BybitGateway::new(config.bybit_settings(), config.circuit_breaker())?;
        if config.trading.auto_trade && !gateway.has_credentials() {
            tracing::warn!("auto_trade is on but BYBIT_API_KEY/BYBIT_API_SECRET are missing");
        }
        let notifier = notifier_from_config(&config);
        let store = open_store(&config)?;
        let journal = config.store.csv_path.clone().map(SignalJournal::new);
        let mut runner = Self::new(config, Box::new(gateway), notifier);
        runner.store = store;
        runner.journal = journal;
        Ok(runner)
    }

    pub fn with_store(mut self, store: Box<dyn SignalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_journal(mut self, journal: SignalJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn context(&self) -> CycleContext<'_> {
        CycleContext {
            config: &self.config,
            gateway: self.gateway.as_ref(),
            notifier: self.notifier.as_ref(),
            store: self.store.as_deref(),
            journal: self.journal.as_ref(),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.schedule.retry_attempts,
            Duration::from_secs(self.config.schedule.retry_backoff_secs),
        )
    }

    /// One cycle with retry. Each attempt is a fresh cycle with its own run id.
    pub fn run_once(&self) -> Result<CycleReport, CycleError> {
        let ctx = self.context();
        with_retry(self.retry_policy(), "scan cycle", |_| run_cycle(&ctx, Utc::now()))
    }

    /// Startup message, then cycles per the schedule until done or `stop` is set.
    ///
    /// In loop mode a cycle that fails after all retries is logged and the loop
    /// carries on. `max_cycles` caps the number of cycles in either mode.
    pub fn run(&self, stop: Option<&AtomicBool>, max_cycles: Option<usize>) -> RunSummary {
        let schedule = &self.config.schedule;
        let stopped = || stop.is_some_and(|f| f.load(Ordering::Relaxed));
        let mut summary = RunSummary::default();

        if self.config.notify.startup_message {
            send_best_effort(self.notifier.as_ref(), &report::startup_message(), Channel::Main);
        }

        loop {
            if stopped() || max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            summary.cycles += 1;
            match self.run_once() {
                Ok(report) => {
                    summary.signals += report.signals.len();
                    summary.placed += report.placed.len();
                }
                Err(e) => {
                    tracing::error!(error = %e, "scan cycle failed");
                    summary.failed += 1;
                    summary.last_error = Some(e.to_string());
                }
            }
            if schedule.run_mode == RunMode::Once {
                break;
            }
            sleep_unless_stopped(Duration::from_secs(schedule.interval_seconds), stop);
        }

        if stopped() {
            tracing::info!("stopped by user");
        }
        summary
    }
}

/// Sleep for `total`, returning early once `stop` is set.
pub fn sleep_unless_stopped(total: Duration, stop: Option<&AtomicBool>) {
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return;
        }
        let step = remaining.min(SLEEP_SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}

/// Open the configured SQLite store, if any.
pub fn open_store(config: &AppConfig) -> Result<Option<Box<dyn SignalStore>>, StoreError> {
    let Some(path) = &config.store.sqlite_path else {
        return Ok(None);
    };
    let store: Box<dyn SignalStore> = Box::new(SqliteSignalStore::open(path)?);
    Ok(Some(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_returns_immediately_when_stopped() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();
        sleep_unless_stopped(Duration::from_secs(30), Some(&stop));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_without_flag_runs_to_completion() {
        let started = Instant::now();
        sleep_unless_stopped(Duration::from_millis(20), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn no_store_path_means_no_store() {
        let mut config = AppConfig::default();
        config.store.sqlite_path = None;
        assert!(open_store(&config).unwrap().is_none());
    }
}
