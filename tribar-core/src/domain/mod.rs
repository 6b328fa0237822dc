//! Domain types for tribar

pub mod candle;
pub mod signal;
pub mod timeframe;

pub use candle::{Candle, CandleError, CandleSeries};
pub use signal::{EntryMode, IndicatorSnapshot, PatternSignal, Side};
pub use timeframe::{Timeframe, TimeframeError};

/// Symbol type alias
pub type Symbol = String;
