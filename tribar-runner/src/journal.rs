//! CSV signal journal: an append-only copy of every emitted signal.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tribar_core::domain::PatternSignal;

use crate::store::StoreError;

#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    created_at: String,
    run_id: &'a str,
    symbol: &'a str,
    side: &'static str,
    timeframe: &'a str,
    entry_close: f64,
    entry_retest: f64,
    sl: f64,
    tp: f64,
    rr: f64,
    atr: f64,
    ema50: f64,
    ema200: f64,
    rsi: f64,
    macd_hist: f64,
}

const HEADER: [&str; 15] = [
    "created_at",
    "run_id",
    "symbol",
    "side",
    "timeframe",
    "entry_close",
    "entry_retest",
    "sl",
    "tp",
    "rr",
    "atr",
    "ema50",
    "ema200",
    "rsi",
    "macd_hist",
];

#[derive(Debug, Clone)]
pub struct SignalJournal {
    path: PathBuf,
}

impl SignalJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows, writing the header first when the file is new or empty.
    pub fn append(
        &self,
        run_id: &str,
        signals: &[PatternSignal],
        created_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if signals.is_empty() {
            return Ok(0);
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            wtr.write_record(HEADER)?;
        }
        let created = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        for s in signals {
            wtr.serialize(JournalRow {
                created_at: created.clone(),
                run_id,
                symbol: &s.symbol,
                side: s.side.as_str(),
                timeframe: s.timeframe.as_str(),
                entry_close: s.entry_close,
                entry_retest: s.entry_retest,
                sl: s.stop_loss,
                tp: s.take_profit,
                rr: s.risk_reward(),
                atr: s.atr,
                ema50: s.ema_fast,
                ema200: s.ema_slow,
                rsi: s.rsi,
                macd_hist: s.macd_histogram,
            })?;
        }
        wtr.flush()?;
        Ok(signals.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribar_core::domain::{Side, Timeframe};

    fn signal() -> PatternSignal {
        PatternSignal {
            side: Side::Long,
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::hourly(),
            entry_close: 100.0,
            entry_retest: 99.0,
            stop_loss: 98.0,
            take_profit: 110.0,
            atr: 2.0,
            ema_fast: 99.0,
            ema_slow: 97.0,
            rsi: 55.0,
            macd_histogram: 0.02,
        }
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SignalJournal::new(dir.path().join("nested/signals.csv"));
        let now = Utc::now();
        assert_eq!(journal.append("r1", &[signal()], now).unwrap(), 1);
        assert_eq!(journal.append("r2", &[signal(), signal()], now).unwrap(), 2);

        let text = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("created_at,run_id,symbol"));
        assert_eq!(text.matches("created_at").count(), 1);
        assert!(lines[3].contains(",r2,BTCUSDT,LONG,60,"));
    }

    #[test]
    fn nothing_to_write_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SignalJournal::new(dir.path().join("signals.csv"));
        assert_eq!(journal.append("r", &[], Utc::now()).unwrap(), 0);
        assert!(!journal.path().exists());
    }
}
