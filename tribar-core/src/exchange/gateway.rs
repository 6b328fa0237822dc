//! Exchange gateway trait and the records it exchanges with the core.
//!
//! The trait abstracts the exchange so the scan, universe and guard logic can be
//! exercised against the in-memory gateway. Every method is a blocking call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CandleError, CandleSeries, Side, Timeframe};

/// Structured error types for gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by exchange (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("exchange rejected request (retCode {code}): {message}")]
    Api { code: i64, message: String },

    #[error("order {order_id} not found or already closed")]
    OrderNotFound { order_id: String },

    #[error("HTTP {status}: {context}")]
    Http { status: u16, context: String },

    #[error("hard stop: exchange has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("invalid candle data: {0}")]
    InvalidCandles(#[from] CandleError),
}

/// 24h ticker summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    /// 24h turnover in quote currency; `None` when the exchange sent garbage.
    pub turnover_24h: Option<f64>,
}

/// An open position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,
    pub size: f64,
}

impl PositionInfo {
    pub fn is_open(&self) -> bool {
        self.size.abs() > 0.0
    }
}

/// A resting order. Owned by the exchange; the core only reads its age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OpenOrder {
    /// Creation time, falling back to the last update time.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.updated_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "Limit",
            OrderType::Market => "Market",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    #[serde(rename = "GTC")]
    GoodTillCancel,
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    PostOnly,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GoodTillCancel => "GTC",
            TimeInForce::ImmediateOrCancel => "IOC",
            TimeInForce::PostOnly => "PostOnly",
        }
    }
}

/// Entry order submitted for a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub category: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: f64,
    /// Limit price; ignored for market orders.
    pub price: Option<f64>,
    pub time_in_force: TimeInForce,
    pub client_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
}

/// Stop-loss / take-profit attached to a symbol's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveStop {
    pub category: String,
    pub symbol: String,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reduce_only: bool,
}

/// Trait for exchange gateways (Bybit REST, in-memory).
///
/// Private calls (positions, orders, leverage, stops) require signing material;
/// implementations fail with `AuthenticationRequired` when it is absent.
pub trait ExchangeGateway: Send + Sync {
    /// Human-readable name of this gateway.
    fn name(&self) -> &str;

    fn tickers(&self, category: &str) -> Result<Vec<Ticker>, GatewayError>;

    /// Candles ordered oldest → newest, at most `limit` of them.
    fn klines(
        &self,
        category: &str,
        symbol: &str,
        interval: &Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, GatewayError>;

    fn positions(&self, category: &str, symbol: &str) -> Result<Vec<PositionInfo>, GatewayError>;

    fn open_orders(&self, category: &str, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError>;

    fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, GatewayError>;

    fn cancel_order(&self, category: &str, symbol: &str, order_id: &str)
        -> Result<(), GatewayError>;

    fn set_leverage(&self, category: &str, symbol: &str, leverage: u32)
        -> Result<(), GatewayError>;

    fn set_protective_stop(&self, stop: &ProtectiveStop) -> Result<(), GatewayError>;
}
