//! Integration tests for the trade guard and entry placement.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use tribar_core::domain::{CandleSeries, EntryMode, PatternSignal, Side, Timeframe};
use tribar_core::exchange::{
    ExchangeGateway, GatewayCall, GatewayError, InMemoryGateway, OpenOrder, OrderRequest,
    OrderType, PlacedOrder, PositionInfo, ProtectiveStop, Ticker,
};
use tribar_core::guard::{expire_stale, may_open};
use tribar_core::trade::{open_trade, TradeOutcome, TradeSettings};

// ── Helpers ──────────────────────────────────────────────────────────

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn order_created(id: &str, minutes_ago: i64) -> OpenOrder {
    OpenOrder {
        order_id: id.into(),
        symbol: "BTCUSDT".into(),
        created_at: Some(now() - Duration::minutes(minutes_ago)),
        updated_at: None,
    }
}

fn long_signal() -> PatternSignal {
    PatternSignal {
        side: Side::Long,
        symbol: "BTCUSDT".into(),
        timeframe: "60".parse().unwrap(),
        entry_close: 100.0,
        entry_retest: 99.0,
        stop_loss: 97.0,
        take_profit: 110.0,
        atr: 2.5,
        ema_fast: 98.0,
        ema_slow: 95.0,
        rsi: 60.0,
        macd_histogram: 0.1,
    }
}

/// Lists orders that have already disappeared by the time they are cancelled.
struct VanishingOrders {
    orders: Vec<OpenOrder>,
}

impl ExchangeGateway for VanishingOrders {
    fn name(&self) -> &str {
        "vanishing"
    }
    fn tickers(&self, _: &str) -> Result<Vec<Ticker>, GatewayError> {
        Ok(vec![])
    }
    fn klines(&self, _: &str, _: &str, _: &Timeframe, _: usize) -> Result<CandleSeries, GatewayError> {
        Ok(CandleSeries::default())
    }
    fn positions(&self, _: &str, _: &str) -> Result<Vec<PositionInfo>, GatewayError> {
        Ok(vec![])
    }
    fn open_orders(&self, _: &str, _: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        Ok(self.orders.clone())
    }
    fn place_order(&self, _: &OrderRequest) -> Result<PlacedOrder, GatewayError> {
        unreachable!("sweep never places orders")
    }
    fn cancel_order(&self, _: &str, _: &str, order_id: &str) -> Result<(), GatewayError> {
        Err(GatewayError::OrderNotFound {
            order_id: order_id.to_string(),
        })
    }
    fn set_leverage(&self, _: &str, _: &str, _: u32) -> Result<(), GatewayError> {
        Ok(())
    }
    fn set_protective_stop(&self, _: &ProtectiveStop) -> Result<(), GatewayError> {
        Ok(())
    }
}

// ── Staleness sweep ──────────────────────────────────────────────────

#[test]
fn sweep_cancels_61_minute_order_and_keeps_59_minute_order() {
    let gw = InMemoryGateway::new()
        .with_order(order_created("old", 61))
        .with_order(order_created("young", 59));
    let report = expire_stale(&gw, "linear", "BTCUSDT", Duration::minutes(60), now()).unwrap();
    assert_eq!(report.examined, 2);
    assert_eq!(report.cancelled, vec!["old"]);
    assert_eq!(gw.open_order_ids("BTCUSDT"), vec!["young"]);
}

#[test]
fn sweep_cancels_at_exactly_ttl() {
    let gw = InMemoryGateway::new().with_order(order_created("edge", 60));
    let report = expire_stale(&gw, "linear", "BTCUSDT", Duration::minutes(60), now()).unwrap();
    assert_eq!(report.cancelled, vec!["edge"]);
}

#[test]
fn sweep_falls_back_to_updated_time() {
    let gw = InMemoryGateway::new().with_order(OpenOrder {
        order_id: "u".into(),
        symbol: "BTCUSDT".into(),
        created_at: None,
        updated_at: Some(now() - Duration::hours(3)),
    });
    let report = expire_stale(&gw, "linear", "BTCUSDT", Duration::minutes(60), now()).unwrap();
    assert_eq!(report.cancelled, vec!["u"]);
}

#[test]
fn sweep_ignores_orders_already_gone() {
    let gw = VanishingOrders {
        orders: vec![order_created("filled", 500)],
    };
    let report = expire_stale(&gw, "linear", "BTCUSDT", Duration::minutes(60), now()).unwrap();
    assert!(report.cancelled.is_empty());
    assert_eq!(report.already_gone, vec!["filled"]);
}

// ── Admission ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn admission_denies_at_or_above_cap(
        positions in 0usize..5,
        orders in 0usize..5,
        cap in 1usize..8,
    ) {
        let mut gw = InMemoryGateway::new();
        for _ in 0..positions {
            gw = gw.with_position("BTCUSDT", 1.0);
        }
        for i in 0..orders {
            gw = gw.with_order(order_created(&format!("o{i}"), 1));
        }
        let admitted = may_open(&gw, "linear", "BTCUSDT", cap).unwrap();
        prop_assert_eq!(admitted, positions + orders < cap);
    }
}

#[test]
fn admission_is_per_symbol() {
    let gw = InMemoryGateway::new().with_position("ETHUSDT", 2.0);
    assert!(may_open(&gw, "linear", "BTCUSDT", 1).unwrap());
    assert!(!may_open(&gw, "linear", "ETHUSDT", 1).unwrap());
}

// ── Entry placement ──────────────────────────────────────────────────

#[test]
fn open_trade_runs_steps_in_order() {
    let gw = InMemoryGateway::new();
    let settings = TradeSettings::default();
    let outcome = open_trade(&gw, &long_signal(), &settings, now()).unwrap();
    let placed = match outcome {
        TradeOutcome::Placed(p) => p,
        TradeOutcome::NotAdmitted => panic!("empty book must admit"),
    };
    assert_eq!(placed.qty, 0.2);
    assert_eq!(placed.client_order_id, format!("ENT_{}", now().timestamp_millis()));

    let calls = gw.calls();
    assert!(matches!(calls[0], GatewayCall::Positions { .. }));
    assert!(matches!(calls[1], GatewayCall::OpenOrders { .. }));
    assert!(matches!(calls[2], GatewayCall::SetLeverage { leverage: 5, .. }));
    match &calls[3] {
        GatewayCall::PlaceOrder(req) => {
            assert_eq!(req.side, Side::Long);
            assert_eq!(req.price, Some(100.0));
            assert_eq!(req.order_type, OrderType::Limit);
        }
        other => panic!("expected order, got {other:?}"),
    }
    match &calls[4] {
        GatewayCall::SetProtectiveStop(stop) => {
            assert_eq!(stop.stop_loss, Some(97.0));
            assert_eq!(stop.take_profit, Some(110.0));
            assert!(stop.reduce_only);
        }
        other => panic!("expected protective stop, got {other:?}"),
    }
    assert_eq!(calls.len(), 5);
}

#[test]
fn second_entry_is_not_admitted_while_first_rests() {
    let gw = InMemoryGateway::new();
    let settings = TradeSettings::default();
    open_trade(&gw, &long_signal(), &settings, now()).unwrap();
    let again = open_trade(&gw, &long_signal(), &settings, now()).unwrap();
    assert_eq!(again, TradeOutcome::NotAdmitted);
    assert_eq!(gw.placed_orders().len(), 1);
}

#[test]
fn retest_market_entry() {
    let gw = InMemoryGateway::new();
    let settings = TradeSettings {
        order_type: OrderType::Market,
        entry_mode: EntryMode::Retest,
        ..TradeSettings::default()
    };
    open_trade(&gw, &long_signal(), &settings, now()).unwrap();
    let req = &gw.placed_orders()[0];
    assert_eq!(req.price, None);
    // quantity sized from the retest level
    assert_eq!(req.qty, 0.2020202);
}
