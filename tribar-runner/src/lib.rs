//! Tribar Runner — configuration, scan cycle, alerts, persistence and the run loop.
//!
//! This crate builds on `tribar-core` to provide:
//! - TOML configuration with secrets from the environment
//! - Telegram / log notifiers
//! - SQLite signal store and CSV signal journal
//! - One-cycle orchestration with an optional worker pool
//! - Fixed-backoff retry and the once/loop run schedule

pub mod config;
pub mod cycle;
pub mod journal;
pub mod notify;
pub mod report;
pub mod retry;
pub mod runner;
pub mod store;

pub use config::{load_dotenv, AppConfig, ConfigError, RunId, RunMode, DEFAULT_CONFIG_FILE};
pub use cycle::{run_cycle, CycleContext, CycleError, CycleReport};
pub use journal::SignalJournal;
pub use notify::{
    notifier_from_config, send_best_effort, Channel, LogNotifier, MemoryNotifier, NotifyError,
    Notifier, TelegramNotifier,
};
pub use retry::{with_retry, RetryPolicy};
pub use runner::{open_store, sleep_unless_stopped, RunSummary, Runner, RunnerError};
pub use store::{SignalStore, SqliteSignalStore, StoreError};
