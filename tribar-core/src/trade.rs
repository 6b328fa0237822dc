//! Entry order placement for a detected signal.
//!
//! The per-symbol sequence is admission, leverage, entry order, protective stop.
//! Each step runs only if the previous one succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EntryMode, PatternSignal};
use crate::exchange::{
    ExchangeGateway, GatewayError, OrderRequest, OrderType, ProtectiveStop, TimeInForce,
};
use crate::guard;

/// Smallest quantity ever submitted.
pub const MIN_QTY: f64 = 0.0001;
const QTY_DECIMALS: i32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSettings {
    pub category: String,
    /// Notional per entry in quote currency.
    pub position_usd: f64,
    pub leverage: u32,
    pub order_type: OrderType,
    pub entry_mode: EntryMode,
    pub time_in_force: TimeInForce,
    pub max_open_per_symbol: usize,
    pub reduce_only_stops: bool,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            category: "linear".into(),
            position_usd: 20.0,
            leverage: 5,
            order_type: OrderType::Limit,
            entry_mode: EntryMode::Close,
            time_in_force: TimeInForce::GoodTillCancel,
            max_open_per_symbol: 1,
            reduce_only_stops: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedEntry {
    pub order_id: String,
    pub client_order_id: String,
    pub qty: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TradeOutcome {
    /// Exposure cap reached; nothing was sent.
    NotAdmitted,
    Placed(PlacedEntry),
}

/// Quantity for a notional at `price`, floored at [`MIN_QTY`] and rounded to 8 decimals.
pub fn order_quantity(position_usd: f64, price: f64) -> f64 {
    let raw = (position_usd / price.max(1e-9)).max(MIN_QTY);
    let scale = 10f64.powi(QTY_DECIMALS);
    (raw * scale).round() / scale
}

pub fn client_order_id(now: DateTime<Utc>) -> String {
    format!("ENT_{}", now.timestamp_millis())
}

pub fn entry_order(
    signal: &PatternSignal,
    settings: &TradeSettings,
    now: DateTime<Utc>,
) -> OrderRequest {
    let price = signal.entry_price(settings.entry_mode);
    OrderRequest {
        category: settings.category.clone(),
        symbol: signal.symbol.clone(),
        side: signal.side,
        order_type: settings.order_type,
        qty: order_quantity(settings.position_usd, price),
        price: match settings.order_type {
            OrderType::Limit => Some(price),
            OrderType::Market => None,
        },
        time_in_force: settings.time_in_force,
        client_order_id: client_order_id(now),
    }
}

/// Set leverage, place the entry and attach SL/TP. No admission check.
///
/// Leverage that is already at the requested value is not an error; the
/// gateway reports it as success.
pub fn place_entry(
    gateway: &dyn ExchangeGateway,
    signal: &PatternSignal,
    settings: &TradeSettings,
    now: DateTime<Utc>,
) -> Result<PlacedEntry, GatewayError> {
    let request = entry_order(signal, settings, now);

    gateway.set_leverage(&settings.category, &signal.symbol, settings.leverage)?;
    let placed = gateway.place_order(&request)?;
    gateway.set_protective_stop(&ProtectiveStop {
        category: settings.category.clone(),
        symbol: signal.symbol.clone(),
        stop_loss: Some(signal.stop_loss),
        take_profit: Some(signal.take_profit),
        reduce_only: settings.reduce_only_stops,
    })?;

    tracing::info!(
        symbol = %signal.symbol,
        side = %signal.side,
        order_id = %placed.order_id,
        qty = request.qty,
        "entry placed"
    );
    Ok(PlacedEntry {
        order_id: placed.order_id,
        client_order_id: request.client_order_id,
        qty: request.qty,
        price: signal.entry_price(settings.entry_mode),
    })
}

/// Admission check followed by [`place_entry`].
pub fn open_trade(
    gateway: &dyn ExchangeGateway,
    signal: &PatternSignal,
    settings: &TradeSettings,
    now: DateTime<Utc>,
) -> Result<TradeOutcome, GatewayError> {
    if !guard::may_open(
        gateway,
        &settings.category,
        &signal.symbol,
        settings.max_open_per_symbol,
    )? {
        return Ok(TradeOutcome::NotAdmitted);
    }
    place_entry(gateway, signal, settings, now).map(TradeOutcome::Placed)
}
