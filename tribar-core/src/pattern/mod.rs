//! Pattern recognition: three consecutive directional candles with
//! trend, momentum, and volume confirmation, plus derived risk levels.

pub mod detector;
pub mod thresholds;

pub use detector::{
    indicator_snapshot, macd_confirms, pattern_window, PatternDetector, Rejection, MIN_HISTORY,
};
pub use thresholds::{DetectorConfig, SideThresholds, RELAXED_BODY_RATIO, RELAXED_WICK_RATIO};
