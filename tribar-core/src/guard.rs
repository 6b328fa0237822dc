//! Trade guard: exposure admission and stale-order expiry.
//!
//! Both checks read live exchange state and then act on it. Nothing is locked
//! between the read and the subsequent order, so an order placed elsewhere
//! (another process, the web UI) in that window can push a symbol past its
//! cap. The exchange offers no conditional-create primitive for this, so the
//! check stays advisory.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::exchange::{ExchangeGateway, GatewayError, OpenOrder};

/// Non-zero positions plus resting orders for `symbol`.
pub fn open_exposure(
    gateway: &dyn ExchangeGateway,
    category: &str,
    symbol: &str,
) -> Result<usize, GatewayError> {
    let positions = gateway
        .positions(category, symbol)?
        .iter()
        .filter(|p| p.is_open())
        .count();
    let orders = gateway.open_orders(category, symbol)?.len();
    Ok(positions + orders)
}

/// Admit a new entry only while exposure is below `cap`.
pub fn may_open(
    gateway: &dyn ExchangeGateway,
    category: &str,
    symbol: &str,
    cap: usize,
) -> Result<bool, GatewayError> {
    let open = open_exposure(gateway, category, symbol)?;
    let admitted = open < cap;
    if !admitted {
        tracing::debug!(%symbol, open, cap, "admission denied");
    }
    Ok(admitted)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub cancelled: Vec<String>,
    /// Orders that filled or were cancelled between the listing and the cancel.
    pub already_gone: Vec<String>,
}

/// Age of an order at `now`. Orders with no timestamps are treated as brand new.
pub fn order_age(order: &OpenOrder, now: DateTime<Utc>) -> Duration {
    now - order.reference_time().unwrap_or(now)
}

pub fn is_stale(order: &OpenOrder, ttl: Duration, now: DateTime<Utc>) -> bool {
    order_age(order, now) >= ttl
}

/// Cancel every resting order on `symbol` whose age is at least `ttl`.
pub fn expire_stale(
    gateway: &dyn ExchangeGateway,
    category: &str,
    symbol: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<SweepReport, GatewayError> {
    let orders = gateway.open_orders(category, symbol)?;
    let mut report = SweepReport {
        examined: orders.len(),
        ..SweepReport::default()
    };

    for order in orders.iter().filter(|o| is_stale(o, ttl, now)) {
        match gateway.cancel_order(category, symbol, &order.order_id) {
            Ok(()) => {
                tracing::info!(
                    %symbol,
                    order_id = %order.order_id,
                    age_minutes = order_age(order, now).num_minutes(),
                    "cancelled stale order"
                );
                report.cancelled.push(order.order_id.clone());
            }
            Err(GatewayError::OrderNotFound { order_id }) => {
                report.already_gone.push(order_id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::InMemoryGateway;

    fn order(id: &str, created: Option<DateTime<Utc>>) -> OpenOrder {
        OpenOrder {
            order_id: id.into(),
            symbol: "BTCUSDT".into(),
            created_at: created,
            updated_at: None,
        }
    }

    #[test]
    fn untimed_order_is_never_stale() {
        let now = Utc::now();
        assert!(!is_stale(&order("a", None), Duration::seconds(1), now));
    }

    #[test]
    fn zero_cap_always_denies() {
        let gw = InMemoryGateway::new();
        assert!(!may_open(&gw, "linear", "BTCUSDT", 0).unwrap());
        assert!(may_open(&gw, "linear", "BTCUSDT", 1).unwrap());
    }

    #[test]
    fn flat_positions_do_not_count() {
        let gw = InMemoryGateway::new()
            .with_position("BTCUSDT", 0.0)
            .with_position("BTCUSDT", 0.25);
        assert_eq!(open_exposure(&gw, "linear", "BTCUSDT").unwrap(), 1);
    }
}
