//! SQLite-backed signal audit trail.
//!
//! One row per emitted signal, tagged with the cycle's run id. The table is
//! also the only cross-cycle state: `has_recent_signal` lets a cycle skip a
//! signal that was already alerted.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use tribar_core::domain::{PatternSignal, Side, Timeframe};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

pub trait SignalStore: Send + Sync {
    /// Insert one row per signal; returns the number of rows written.
    fn append_signals(
        &self,
        run_id: &str,
        signals: &[PatternSignal],
        created_at: DateTime<Utc>,
    ) -> Result<usize, StoreError>;

    /// Whether a signal for (symbol, timeframe[, side]) was stored within `within_hours` of `now`.
    fn has_recent_signal(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        side: Option<Side>,
        within_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS signals (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id       TEXT NOT NULL,
    symbol       TEXT NOT NULL,
    side         TEXT NOT NULL,
    timeframe    TEXT NOT NULL,
    entry_close  REAL NOT NULL,
    entry_retest REAL NOT NULL,
    sl           REAL NOT NULL,
    tp           REAL NOT NULL,
    ema50        REAL,
    ema200       REAL,
    rsi          REAL,
    macd_hist    REAL,
    atr          REAL NOT NULL,
    rr           REAL NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_signals_runid ON signals(run_id);
CREATE INDEX IF NOT EXISTS idx_signals_symbol_timeframe ON signals(symbol, timeframe);
";

/// Millisecond RFC 3339 in UTC; sorts lexicographically.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// NaN indicators (still in warmup) are stored as NULL.
fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub struct SqliteSignalStore {
    conn: Mutex<Connection>,
}

impl SqliteSignalStore {
    /// Open (creating parent directories, the file and the schema as needed).
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "signal store opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows stored under `run_id`.
    pub fn count_for_run(&self, run_id: &str) -> Result<usize, StoreError> {
        let n: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM signals WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl SignalStore for SqliteSignalStore {
    fn append_signals(
        &self,
        run_id: &str,
        signals: &[PatternSignal],
        created_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if signals.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let created = timestamp(created_at);
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO signals (run_id, symbol, side, timeframe, entry_close, entry_retest, \
                 sl, tp, ema50, ema200, rsi, macd_hist, atr, rr, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            )?;
            for s in signals {
                inserted += stmt.execute(params![
                    run_id,
                    s.symbol,
                    s.side.as_str(),
                    s.timeframe.as_str(),
                    s.entry_close,
                    s.entry_retest,
                    s.stop_loss,
                    s.take_profit,
                    finite(s.ema_fast),
                    finite(s.ema_slow),
                    finite(s.rsi),
                    finite(s.macd_histogram),
                    s.atr,
                    s.risk_reward(),
                    created,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn has_recent_signal(
        &self,
        symbol: &str,
        timeframe: &Timeframe,
        side: Option<Side>,
        within_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let cutoff = timestamp(now - Duration::hours(i64::from(within_hours)));
        let conn = self.lock();
        let found: Option<i64> = match side {
            Some(side) => conn
                .query_row(
                    "SELECT 1 FROM signals WHERE symbol = ?1 AND timeframe = ?2 AND side = ?3 \
                     AND created_at >= ?4 LIMIT 1",
                    params![symbol, timeframe.as_str(), side.as_str(), cutoff],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT 1 FROM signals WHERE symbol = ?1 AND timeframe = ?2 \
                     AND created_at >= ?3 LIMIT 1",
                    params![symbol, timeframe.as_str(), cutoff],
                    |row| row.get(0),
                )
                .optional()?,
        };
        Ok(found.is_some())
    }
}
