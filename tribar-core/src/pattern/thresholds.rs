//! Detector configuration and the relaxation rule.
//!
//! The configuration is an immutable value handed to every detection call; no
//! filter toggle lives in global state.

use serde::{Deserialize, Serialize};

use crate::domain::Side;

/// Body floor applied by relaxation mode.
pub const RELAXED_BODY_RATIO: f64 = 0.45;
/// Wick ceiling applied by relaxation mode.
pub const RELAXED_WICK_RATIO: f64 = 0.5;

/// Candle-shape and momentum thresholds for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideThresholds {
    /// Minimum body / range for each window candle.
    pub min_body_ratio: f64,
    /// Maximum opposing wick / range (upper wick for LONG, lower for SHORT).
    pub max_wick_ratio: f64,
    pub rsi_min: f64,
    pub rsi_max: f64,
}

impl SideThresholds {
    pub fn long_default() -> Self {
        Self {
            min_body_ratio: 0.6,
            max_wick_ratio: 0.35,
            rsi_min: 50.0,
            rsi_max: 72.0,
        }
    }

    pub fn short_default() -> Self {
        Self {
            min_body_ratio: 0.6,
            max_wick_ratio: 0.35,
            rsi_min: 28.0,
            rsi_max: 50.0,
        }
    }

    /// Loosen the thresholds for `side`. Never tightens any bound.
    pub fn relaxed(self, side: Side) -> Self {
        let (rsi_floor, rsi_ceiling) = match side {
            Side::Long => (45.0, 75.0),
            Side::Short => (25.0, 55.0),
        };
        Self {
            min_body_ratio: self.min_body_ratio.min(RELAXED_BODY_RATIO),
            max_wick_ratio: self.max_wick_ratio.max(RELAXED_WICK_RATIO),
            rsi_min: self.rsi_min.min(rsi_floor),
            rsi_max: self.rsi_max.max(rsi_ceiling),
        }
    }
}

/// Everything the detector needs besides the candles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub use_ema: bool,
    pub use_rsi: bool,
    pub use_macd: bool,
    pub use_volume: bool,

    pub long: SideThresholds,
    pub short: SideThresholds,

    /// Histogram band around zero that still confirms the direction.
    pub macd_tolerance: f64,
    /// Last volume must reach this multiple of the trailing mean.
    pub vol_min_ratio: f64,
    pub vol_window: usize,

    /// Loosen thresholds once before evaluation.
    pub relax: bool,
    /// Evaluate the still-forming candle as the third pattern candle.
    pub include_forming: bool,

    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_length: usize,
    pub atr_length: usize,
    pub sl_atr_mult: f64,
    pub tp_atr_mult: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            use_ema: true,
            use_rsi: true,
            use_macd: true,
            use_volume: true,
            long: SideThresholds::long_default(),
            short: SideThresholds::short_default(),
            macd_tolerance: 0.0008,
            vol_min_ratio: 0.6,
            vol_window: 20,
            relax: true,
            include_forming: true,
            ema_fast: 50,
            ema_slow: 200,
            rsi_length: 14,
            atr_length: 14,
            sl_atr_mult: 0.5,
            tp_atr_mult: 3.6,
        }
    }
}

impl DetectorConfig {
    /// Effective thresholds for `side`, after relaxation if enabled.
    pub fn thresholds(&self, side: Side) -> SideThresholds {
        let base = match side {
            Side::Long => self.long,
            Side::Short => self.short,
        };
        if self.relax {
            base.relaxed(side)
        } else {
            base
        }
    }

    /// Configuration with every optional filter switched off.
    pub fn shape_only() -> Self {
        Self {
            use_ema: false,
            use_rsi: false,
            use_macd: false,
            use_volume: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_relax_to_known_values() {
        let cfg = DetectorConfig::default();
        let long = cfg.thresholds(Side::Long);
        assert_eq!(long.min_body_ratio, 0.45);
        assert_eq!(long.max_wick_ratio, 0.5);
        assert_eq!((long.rsi_min, long.rsi_max), (45.0, 75.0));
        let short = cfg.thresholds(Side::Short);
        assert_eq!((short.rsi_min, short.rsi_max), (25.0, 55.0));
    }

    #[test]
    fn relax_off_keeps_configured_values() {
        let cfg = DetectorConfig {
            relax: false,
            ..DetectorConfig::default()
        };
        assert_eq!(cfg.thresholds(Side::Long), SideThresholds::long_default());
    }

    #[test]
    fn relax_keeps_already_loose_values() {
        let loose = SideThresholds {
            min_body_ratio: 0.2,
            max_wick_ratio: 0.9,
            rsi_min: 10.0,
            rsi_max: 95.0,
        };
        assert_eq!(loose.relaxed(Side::Long), loose);
    }

    fn arb_thresholds() -> impl Strategy<Value = SideThresholds> {
        (0.0..1.0_f64, 0.0..1.0_f64, 0.0..60.0_f64, 40.0..100.0_f64).prop_map(
            |(body, wick, lo, hi)| SideThresholds {
                min_body_ratio: body,
                max_wick_ratio: wick,
                rsi_min: lo,
                rsi_max: hi,
            },
        )
    }

    proptest! {
        /// Relaxation never tightens a bound.
        #[test]
        fn relaxation_only_loosens(t in arb_thresholds(), long in any::<bool>()) {
            let side = if long { Side::Long } else { Side::Short };
            let r = t.relaxed(side);
            prop_assert!(r.min_body_ratio <= t.min_body_ratio);
            prop_assert!(r.max_wick_ratio >= t.max_wick_ratio);
            prop_assert!(r.rsi_min <= t.rsi_min);
            prop_assert!(r.rsi_max >= t.rsi_max);
        }
    }
}
