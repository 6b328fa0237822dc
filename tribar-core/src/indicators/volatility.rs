//! Realized volatility of log returns.

/// Sample standard deviation (n - 1) of log returns over the trailing
/// `lookback + 1` closes.
///
/// Returns `None` when fewer than `lookback` closes are available, when a price
/// in the window is not strictly positive, or when fewer than two returns remain.
pub fn log_return_std(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || closes.len() < lookback {
        return None;
    }
    let start = closes.len().saturating_sub(lookback + 1);
    let window = &closes[start..];
    if window.iter().any(|&p| p.is_nan() || p <= 0.0) {
        return None;
    }

    let returns: Vec<f64> = window.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    Some(var.sqrt())
}
