//! In-memory exchange gateway for dry runs and tests.
//!
//! Holds tickers, candle series, positions and resting orders behind a mutex,
//! and records every call in order so tests can assert what was (and was not)
//! requested.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::gateway::{
    ExchangeGateway, GatewayError, OpenOrder, OrderRequest, PlacedOrder, PositionInfo,
    ProtectiveStop, Ticker,
};
use crate::domain::{CandleSeries, Timeframe};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Tickers,
    Klines { symbol: String, interval: String, limit: usize },
    Positions { symbol: String },
    OpenOrders { symbol: String },
    PlaceOrder(OrderRequest),
    CancelOrder { symbol: String, order_id: String },
    SetLeverage { symbol: String, leverage: u32 },
    SetProtectiveStop(ProtectiveStop),
}

#[derive(Debug, Default)]
struct State {
    tickers: Vec<Ticker>,
    klines: HashMap<(String, String), CandleSeries>,
    positions: HashMap<String, Vec<PositionInfo>>,
    orders: HashMap<String, Vec<OpenOrder>>,
    calls: Vec<GatewayCall>,
    next_order_id: u64,
    fail_tickers: u32,
    failing_klines: Vec<String>,
    failing_positions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_ticker(self, symbol: &str, turnover_24h: Option<f64>) -> Self {
        self.lock().tickers.push(Ticker {
            symbol: symbol.to_string(),
            turnover_24h,
        });
        self
    }

    pub fn with_klines(self, symbol: &str, interval: &Timeframe, series: CandleSeries) -> Self {
        self.lock()
            .klines
            .insert((symbol.to_string(), interval.as_str().to_string()), series);
        self
    }

    pub fn with_position(self, symbol: &str, size: f64) -> Self {
        self.lock()
            .positions
            .entry(symbol.to_string())
            .or_default()
            .push(PositionInfo {
                symbol: symbol.to_string(),
                size,
            });
        self
    }

    pub fn with_order(self, order: OpenOrder) -> Self {
        self.lock()
            .orders
            .entry(order.symbol.clone())
            .or_default()
            .push(order);
        self
    }

    /// The next `times` ticker requests fail with a network error.
    pub fn fail_tickers(self, times: u32) -> Self {
        self.lock().fail_tickers = times;
        self
    }

    /// Every kline request for `symbol` fails with a network error.
    pub fn fail_klines_for(self, symbol: &str) -> Self {
        self.lock().failing_klines.push(symbol.to_string());
        self
    }

    pub fn fail_positions_for(self, symbol: &str) -> Self {
        self.lock().failing_positions.push(symbol.to_string());
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn open_order_ids(&self, symbol: &str) -> Vec<String> {
        self.lock()
            .orders
            .get(symbol)
            .map(|orders| orders.iter().map(|o| o.order_id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::PlaceOrder(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ExchangeGateway for InMemoryGateway {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn tickers(&self, _category: &str) -> Result<Vec<Ticker>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Tickers);
        if state.fail_tickers > 0 {
            state.fail_tickers -= 1;
            return Err(GatewayError::NetworkUnreachable("injected ticker failure".into()));
        }
        Ok(state.tickers.clone())
    }

    fn klines(
        &self,
        _category: &str,
        symbol: &str,
        interval: &Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Klines {
            symbol: symbol.to_string(),
            interval: interval.as_str().to_string(),
            limit,
        });
        if state.failing_klines.iter().any(|s| s == symbol) {
            return Err(GatewayError::NetworkUnreachable(format!(
                "injected kline failure for {symbol}"
            )));
        }
        let Some(series) = state
            .klines
            .get(&(symbol.to_string(), interval.as_str().to_string()))
        else {
            return Ok(CandleSeries::default());
        };
        let candles = series.candles();
        let start = candles.len().saturating_sub(limit);
        Ok(CandleSeries::new(candles[start..].to_vec())?)
    }

    fn positions(&self, _category: &str, symbol: &str) -> Result<Vec<PositionInfo>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::Positions {
            symbol: symbol.to_string(),
        });
        if state.failing_positions.iter().any(|s| s == symbol) {
            return Err(GatewayError::NetworkUnreachable(format!(
                "injected position failure for {symbol}"
            )));
        }
        Ok(state.positions.get(symbol).cloned().unwrap_or_default())
    }

    fn open_orders(&self, _category: &str, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::OpenOrders {
            symbol: symbol.to_string(),
        });
        Ok(state.orders.get(symbol).cloned().unwrap_or_default())
    }

    fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::PlaceOrder(request.clone()));
        state.next_order_id += 1;
        let order_id = format!("mem-{}", state.next_order_id);
        let now = Utc::now();
        state
            .orders
            .entry(request.symbol.clone())
            .or_default()
            .push(OpenOrder {
                order_id: order_id.clone(),
                symbol: request.symbol.clone(),
                created_at: Some(now),
                updated_at: Some(now),
            });
        Ok(PlacedOrder { order_id })
    }

    fn cancel_order(
        &self,
        _category: &str,
        symbol: &str,
        order_id: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.calls.push(GatewayCall::CancelOrder {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        });
        let orders = state.orders.entry(symbol.to_string()).or_default();
        let before = orders.len();
        orders.retain(|o| o.order_id != order_id);
        if orders.len() == before {
            return Err(GatewayError::OrderNotFound {
                order_id: order_id.to_string(),
            });
        }
        Ok(())
    }

    fn set_leverage(
        &self,
        _category: &str,
        symbol: &str,
        leverage: u32,
    ) -> Result<(), GatewayError> {
        self.lock().calls.push(GatewayCall::SetLeverage {
            symbol: symbol.to_string(),
            leverage,
        });
        Ok(())
    }

    fn set_protective_stop(&self, stop: &ProtectiveStop) -> Result<(), GatewayError> {
        self.lock()
            .calls
            .push(GatewayCall::SetProtectiveStop(stop.clone()));
        Ok(())
    }
}
