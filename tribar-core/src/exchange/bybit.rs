//! Bybit v5 REST gateway.
//!
//! Blocking HTTP via `reqwest`. Public market endpoints are unsigned; private
//! endpoints carry `X-BAPI-*` headers (see [`super::signing`]). Every response is
//! a `{retCode, retMsg, result}` envelope; a non-zero `retCode` becomes a typed
//! [`GatewayError`]. HTTP 403 trips the shared circuit breaker, 429 and 5xx
//! count toward it.
//!
//! There is no per-request retry here: transport errors propagate to the
//! cycle-level retry in the runner.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::CircuitBreaker;
use super::gateway::{
    ExchangeGateway, GatewayError, OpenOrder, OrderRequest, OrderType, PlacedOrder, PositionInfo,
    ProtectiveStop, Ticker,
};
use super::signing::{canonical_query, Credentials};
use crate::domain::{Candle, CandleSeries, Timeframe};

/// Demo trading host; mainnet must be opted into explicitly.
pub const DEFAULT_BASE_URL: &str = "https://api-demo.bybit.com";

/// retCode: order does not exist or is already closed.
pub const RET_ORDER_NOT_FOUND: i64 = 110001;
/// retCode: requested leverage equals the current one.
pub const RET_LEVERAGE_NOT_MODIFIED: i64 = 110043;
const RET_AUTH_CODES: [i64; 3] = [10003, 10004, 10005];
const RET_RATE_LIMITED: i64 = 10006;

/// Connection settings for [`BybitGateway`].
#[derive(Debug, Clone)]
pub struct BybitSettings {
    pub base_url: String,
    pub recv_window_ms: u64,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for BybitSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            recv_window_ms: 5000,
            timeout: Duration::from_secs(30),
            credentials: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawTicker {
    symbol: String,
    #[serde(rename = "turnover24h", default)]
    turnover_24h: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    symbol: String,
    #[serde(default)]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    #[serde(rename = "orderId")]
    order_id: String,
    symbol: String,
    #[serde(rename = "createdTime", default)]
    created_time: Option<String>,
    #[serde(rename = "updatedTime", default)]
    updated_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaced {
    #[serde(rename = "orderId")]
    order_id: String,
}

enum Method {
    Get,
    Post,
}

pub struct BybitGateway {
    client: reqwest::blocking::Client,
    base_url: String,
    recv_window_ms: u64,
    credentials: Option<Credentials>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl BybitGateway {
    pub fn new(
        settings: BybitSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::NetworkUnreachable(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            recv_window_ms: settings.recv_window_ms,
            credentials: settings.credentials,
            circuit_breaker,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &BTreeMap<&str, String>,
        signed: bool,
    ) -> Result<Value, GatewayError> {
        let credentials = match (&self.credentials, signed) {
            (None, true) => {
                return Err(GatewayError::AuthenticationRequired(format!(
                    "{path} needs BYBIT_API_KEY and BYBIT_API_SECRET"
                )))
            }
            (Some(c), true) => Some(c),
            (_, false) => None,
        };

        if !self.circuit_breaker.is_allowed() {
            return Err(GatewayError::CircuitBreakerTripped);
        }

        let url = format!("{}{path}", self.base_url);
        let (builder, payload) = match method {
            Method::Get => {
                let query = canonical_query(params);
                let full = if query.is_empty() {
                    url
                } else {
                    format!("{url}?{query}")
                };
                (self.client.get(full), query)
            }
            Method::Post => {
                let body = serde_json::to_string(params).map_err(|e| {
                    GatewayError::ResponseFormatChanged(format!("encode body for {path}: {e}"))
                })?;
                (
                    self.client
                        .post(url)
                        .header("Content-Type", "application/json")
                        .body(body.clone()),
                    body,
                )
            }
        };

        let mut builder = builder;
        if let Some(creds) = credentials {
            let ts = Utc::now().timestamp_millis();
            for (name, value) in creds.auth_headers(ts, self.recv_window_ms, &payload)? {
                builder = builder.header(name, value);
            }
        }

        let resp = builder
            .send()
            .map_err(|e| GatewayError::NetworkUnreachable(format!("{path}: {e}")))?;
        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(GatewayError::CircuitBreakerTripped);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(GatewayError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthenticationRequired(format!(
                "{path} rejected the API key"
            )));
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.circuit_breaker.record_failure();
            }
            return Err(GatewayError::Http {
                status: status.as_u16(),
                context: path.to_string(),
            });
        }

        let envelope: Envelope = resp.json().map_err(|e| {
            GatewayError::ResponseFormatChanged(format!("failed to parse {path} response: {e}"))
        })?;
        self.circuit_breaker.record_success();

        if envelope.ret_code != 0 {
            return Err(ret_code_error(envelope.ret_code, envelope.ret_msg));
        }
        Ok(envelope.result)
    }

    fn list<T: for<'de> Deserialize<'de>>(path: &str, result: Value) -> Result<Vec<T>, GatewayError> {
        let parsed: ListResult<T> = serde_json::from_value(result).map_err(|e| {
            GatewayError::ResponseFormatChanged(format!("unexpected {path} result: {e}"))
        })?;
        Ok(parsed.list)
    }
}

fn ret_code_error(code: i64, message: String) -> GatewayError {
    if RET_AUTH_CODES.contains(&code) {
        GatewayError::AuthenticationRequired(message)
    } else if code == RET_RATE_LIMITED {
        GatewayError::RateLimited { retry_after_secs: 1 }
    } else {
        GatewayError::Api { code, message }
    }
}

fn parse_ms(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

/// Parse one kline row `[start, open, high, low, close, volume, turnover]`.
fn parse_kline_row(row: &[String]) -> Result<Candle, GatewayError> {
    let field = |i: usize| -> Result<&str, GatewayError> {
        row.get(i).map(String::as_str).ok_or_else(|| {
            GatewayError::ResponseFormatChanged(format!("kline row has {} fields", row.len()))
        })
    };
    let num = |i: usize| -> Result<f64, GatewayError> {
        field(i)?.parse::<f64>().map_err(|e| {
            GatewayError::ResponseFormatChanged(format!("kline field {i}: {e}"))
        })
    };

    let start = parse_ms(Some(field(0)?)).ok_or_else(|| {
        GatewayError::ResponseFormatChanged(format!("invalid kline start: {:?}", row.first()))
    })?;
    let candle = Candle {
        start,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
        // older responses omit turnover
        turnover: num(6).unwrap_or(0.0),
    };
    if !candle.is_sane() {
        return Err(GatewayError::ResponseFormatChanged(format!(
            "kline at {start} has inconsistent OHLC"
        )));
    }
    Ok(candle)
}

fn fmt_num(v: f64) -> String {
    format!("{v}")
}

impl ExchangeGateway for BybitGateway {
    fn name(&self) -> &str {
        "bybit"
    }

    fn tickers(&self, category: &str) -> Result<Vec<Ticker>, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        let result = self.request(Method::Get, "/v5/market/tickers", &params, false)?;
        let raw: Vec<RawTicker> = Self::list("/v5/market/tickers", result)?;
        Ok(raw
            .into_iter()
            .map(|t| Ticker {
                symbol: t.symbol,
                turnover_24h: t
                    .turnover_24h
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|v| v.is_finite()),
            })
            .collect())
    }

    fn klines(
        &self,
        category: &str,
        symbol: &str,
        interval: &Timeframe,
        limit: usize,
    ) -> Result<CandleSeries, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        params.insert("symbol", symbol.to_string());
        params.insert("interval", interval.as_str().to_string());
        params.insert("limit", limit.to_string());
        let result = self.request(Method::Get, "/v5/market/kline", &params, false)?;
        let rows: Vec<Vec<String>> = Self::list("/v5/market/kline", result)?;

        let candles = rows
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        // newest first on the wire
        Ok(CandleSeries::from_unsorted(candles)?)
    }

    fn positions(&self, category: &str, symbol: &str) -> Result<Vec<PositionInfo>, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        params.insert("symbol", symbol.to_string());
        let result = self.request(Method::Get, "/v5/position/list", &params, true)?;
        let raw: Vec<RawPosition> = Self::list("/v5/position/list", result)?;
        Ok(raw
            .into_iter()
            .map(|p| PositionInfo {
                symbol: p.symbol,
                size: p.size.and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0),
            })
            .collect())
    }

    fn open_orders(&self, category: &str, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        params.insert("symbol", symbol.to_string());
        let result = self.request(Method::Get, "/v5/order/realtime", &params, true)?;
        let raw: Vec<RawOrder> = Self::list("/v5/order/realtime", result)?;
        Ok(raw
            .into_iter()
            .map(|o| OpenOrder {
                created_at: parse_ms(o.created_time.as_deref()),
                updated_at: parse_ms(o.updated_time.as_deref()),
                order_id: o.order_id,
                symbol: o.symbol,
            })
            .collect())
    }

    fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", request.category.clone());
        params.insert("symbol", request.symbol.clone());
        params.insert("side", request.side.order_side().to_string());
        params.insert("orderType", request.order_type.as_str().to_string());
        params.insert("qty", fmt_num(request.qty));
        params.insert("timeInForce", request.time_in_force.as_str().to_string());
        params.insert("orderLinkId", request.client_order_id.clone());
        if request.order_type == OrderType::Limit {
            if let Some(price) = request.price {
                params.insert("price", fmt_num(price));
            }
        }
        let result = self.request(Method::Post, "/v5/order/create", &params, true)?;
        let placed: RawPlaced = serde_json::from_value(result).map_err(|e| {
            GatewayError::ResponseFormatChanged(format!("order create result: {e}"))
        })?;
        Ok(PlacedOrder {
            order_id: placed.order_id,
        })
    }

    fn cancel_order(
        &self,
        category: &str,
        symbol: &str,
        order_id: &str,
    ) -> Result<(), GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        params.insert("symbol", symbol.to_string());
        params.insert("orderId", order_id.to_string());
        match self.request(Method::Post, "/v5/order/cancel", &params, true) {
            Ok(_) => Ok(()),
            Err(GatewayError::Api { code, .. }) if code == RET_ORDER_NOT_FOUND => {
                Err(GatewayError::OrderNotFound {
                    order_id: order_id.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Buy and sell leverage are set to the same value; "not modified" is success.
    fn set_leverage(
        &self,
        category: &str,
        symbol: &str,
        leverage: u32,
    ) -> Result<(), GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", category.to_string());
        params.insert("symbol", symbol.to_string());
        params.insert("buyLeverage", leverage.to_string());
        params.insert("sellLeverage", leverage.to_string());
        match self.request(Method::Post, "/v5/position/set-leverage", &params, true) {
            Ok(_) => Ok(()),
            Err(GatewayError::Api { code, .. }) if code == RET_LEVERAGE_NOT_MODIFIED => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn set_protective_stop(&self, stop: &ProtectiveStop) -> Result<(), GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("category", stop.category.clone());
        params.insert("symbol", stop.symbol.clone());
        // one-way mode
        params.insert("positionIdx", "0".to_string());
        if let Some(sl) = stop.stop_loss {
            params.insert("stopLoss", fmt_num(sl));
            params.insert("slTriggerBy", "LastPrice".to_string());
        }
        if let Some(tp) = stop.take_profit {
            params.insert("takeProfit", fmt_num(tp));
            params.insert("tpTriggerBy", "LastPrice".to_string());
        }
        params.insert("reduceOnly", stop.reduce_only.to_string());
        self.request(Method::Post, "/v5/position/trading-stop", &params, true)?;
        Ok(())
    }
}
