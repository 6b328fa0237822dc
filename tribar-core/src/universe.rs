//! Universe selection: which symbols a scan cycle looks at.
//!
//! Symbols are filtered by quote currency and ranked either by 24h turnover or,
//! among the most liquid candidates, by short-horizon realized volatility.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::domain::{Symbol, Timeframe};
use crate::exchange::{ExchangeGateway, GatewayError, Ticker};
use crate::indicators::log_return_std;

/// Minimum number of candles fetched per volatility candidate.
pub const MIN_VOL_FETCH: usize = 50;
/// Extra candles fetched beyond the lookback.
pub const VOL_FETCH_BUFFER: usize = 5;
/// Liquidity pre-filter width in volatility mode, as a multiple of `top_n`.
pub const VOL_PREFILTER_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniverseMode {
    #[default]
    #[serde(alias = "TURNOVER")]
    Turnover,
    #[serde(alias = "VOLATILITY")]
    Volatility,
}

impl fmt::Display for UniverseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseMode::Turnover => write!(f, "turnover"),
            UniverseMode::Volatility => write!(f, "volatility"),
        }
    }
}

impl FromStr for UniverseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turnover" => Ok(UniverseMode::Turnover),
            "volatility" => Ok(UniverseMode::Volatility),
            other => Err(format!("unknown universe mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseRequest {
    pub category: String,
    pub quote_suffix: String,
    pub top_n: usize,
    pub mode: UniverseMode,
    /// Candle interval used for the volatility ranking.
    pub timeframe: Timeframe,
    pub vol_lookback: usize,
}

/// Turnover descending; missing or NaN turnover sorts last.
fn turnover_desc(a: &Ticker, b: &Ticker) -> Ordering {
    let key = |t: &Ticker| t.turnover_24h.filter(|v| !v.is_nan());
    match (key(a), key(b)) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter by quote suffix and return up to `limit` tickers by descending turnover.
///
/// The sort is stable, so equal turnovers keep the exchange's order.
pub fn rank_by_turnover(tickers: &[Ticker], quote_suffix: &str, limit: usize) -> Vec<Ticker> {
    let mut ranked: Vec<Ticker> = tickers
        .iter()
        .filter(|t| t.symbol.ends_with(quote_suffix))
        .cloned()
        .collect();
    ranked.sort_by(turnover_desc);
    ranked.truncate(limit);
    ranked
}

/// Select the scan universe. An empty ticker list yields an empty universe.
pub fn select_universe(
    gateway: &dyn ExchangeGateway,
    request: &UniverseRequest,
) -> Result<Vec<Symbol>, GatewayError> {
    let tickers = gateway.tickers(&request.category)?;
    if tickers.is_empty() {
        tracing::info!("exchange returned no tickers; universe is empty");
        return Ok(Vec::new());
    }

    let symbols = match request.mode {
        UniverseMode::Turnover => rank_by_turnover(&tickers, &request.quote_suffix, request.top_n)
            .into_iter()
            .map(|t| t.symbol)
            .collect(),
        UniverseMode::Volatility => rank_by_volatility(gateway, request, &tickers)?,
    };

    tracing::info!(
        mode = %request.mode,
        selected = symbols.len(),
        top_n = request.top_n,
        "universe selected"
    );
    Ok(symbols)
}

fn rank_by_volatility(
    gateway: &dyn ExchangeGateway,
    request: &UniverseRequest,
    tickers: &[Ticker],
) -> Result<Vec<Symbol>, GatewayError> {
    let prefilter = (request.top_n as f64 * VOL_PREFILTER_FACTOR).floor() as usize;
    let candidates = rank_by_turnover(tickers, &request.quote_suffix, prefilter);
    let fetch = (request.vol_lookback + VOL_FETCH_BUFFER).max(MIN_VOL_FETCH);

    let mut scored: Vec<(Symbol, f64)> = Vec::with_capacity(candidates.len());
    for ticker in candidates {
        let series = gateway.klines(&request.category, &ticker.symbol, &request.timeframe, fetch)?;
        if series.len() < request.vol_lookback {
            tracing::debug!(symbol = %ticker.symbol, candles = series.len(), "too little history for volatility rank");
            continue;
        }
        match log_return_std(&series.closes(), request.vol_lookback) {
            Some(std) => scored.push((ticker.symbol, std)),
            None => {
                tracing::debug!(symbol = %ticker.symbol, "volatility undefined");
            }
        }
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(scored
        .into_iter()
        .take(request.top_n)
        .map(|(symbol, _)| symbol)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(symbol: &str, turnover: Option<f64>) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            turnover_24h: turnover,
        }
    }

    #[test]
    fn turnover_rank_filters_suffix_and_sorts() {
        let tickers = vec![
            t("AUSDT", Some(10.0)),
            t("BUSDC", Some(1000.0)),
            t("CUSDT", None),
            t("DUSDT", Some(f64::NAN)),
            t("EUSDT", Some(50.0)),
        ];
        let ranked: Vec<_> = rank_by_turnover(&tickers, "USDT", 10)
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(ranked, vec!["EUSDT", "AUSDT", "CUSDT", "DUSDT"]);
    }

    #[test]
    fn turnover_rank_truncates() {
        let tickers = vec![t("AUSDT", Some(1.0)), t("BUSDT", Some(2.0))];
        let ranked = rank_by_turnover(&tickers, "USDT", 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].symbol, "BUSDT");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("VOLATILITY".parse::<UniverseMode>().unwrap(), UniverseMode::Volatility);
        assert_eq!("turnover".parse::<UniverseMode>().unwrap(), UniverseMode::Turnover);
        assert!("liquidity".parse::<UniverseMode>().is_err());
    }
}
