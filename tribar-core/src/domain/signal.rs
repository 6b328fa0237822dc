//! Pattern signals and the indicator snapshot they carry.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Timeframe;

/// Trade direction of a detected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    /// Exchange order side for an entry in this direction.
    pub fn order_side(&self) -> &'static str {
        match self {
            Side::Long => "Buy",
            Side::Short => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicator values as of the detection index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub atr: f64,
}

/// Which derived entry level an order should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Enter at the close of the third pattern candle.
    #[default]
    Close,
    /// Enter at the body midpoint of the second pattern candle.
    Retest,
}

/// A detected three-candle pattern with derived entry, stop and target.
///
/// Invariant: LONG ⇒ `stop_loss < entry_close < take_profit`;
/// SHORT ⇒ `take_profit < entry_close < stop_loss`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub side: Side,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub entry_close: f64,
    pub entry_retest: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub atr: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
}

impl PatternSignal {
    pub fn entry_price(&self, mode: EntryMode) -> f64 {
        match mode {
            EntryMode::Close => self.entry_close,
            EntryMode::Retest => self.entry_retest,
        }
    }

    /// Reward-to-risk ratio measured from the close entry.
    pub fn risk_reward(&self) -> f64 {
        let (reward, risk) = match self.side {
            Side::Long => (
                self.take_profit - self.entry_close,
                self.entry_close - self.stop_loss,
            ),
            Side::Short => (
                self.entry_close - self.take_profit,
                self.stop_loss - self.entry_close,
            ),
        };
        reward / risk.max(1e-12)
    }

    /// Whether stop, entry and target are ordered correctly for the side.
    pub fn levels_ordered(&self) -> bool {
        match self.side {
            Side::Long => self.stop_loss < self.entry_close && self.entry_close < self.take_profit,
            Side::Short => self.take_profit < self.entry_close && self.entry_close < self.stop_loss,
        }
    }
}
