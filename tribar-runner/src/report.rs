//! Human-readable messages (Telegram HTML).

use tribar_core::domain::{EntryMode, PatternSignal};
use tribar_core::trade::PlacedEntry;

pub fn fmt_price(x: f64) -> String {
    format!("{x:.1}")
}

pub fn risk_summary(signal: &PatternSignal) -> String {
    format!("R:R ≈ {:.2}", signal.risk_reward())
}

pub fn startup_message() -> String {
    "🤖 Bot started: scanning for <b>Three White Soldiers / Three Black Crows</b>...".to_string()
}

/// One-line alert sent as soon as a signal is accepted.
pub fn quick_alert(signal: &PatternSignal, mode: EntryMode) -> String {
    format!(
        "⚡️ {} {} [{}]\nEntry: {} | SL {} | TP {}",
        signal.symbol,
        signal.side,
        signal.timeframe,
        fmt_price(signal.entry_price(mode)),
        fmt_price(signal.stop_loss),
        fmt_price(signal.take_profit),
    )
}

pub fn placed_message(signal: &PatternSignal, entry: &PlacedEntry) -> String {
    format!(
        "🧾 Placed {} {} qty≈{} @ {} (orderId={})",
        signal.side,
        signal.symbol,
        entry.qty,
        fmt_price(entry.price),
        entry.order_id,
    )
}

/// Detailed block for the end-of-cycle report.
pub fn signal_block(signal: &PatternSignal) -> String {
    format!(
        "{} <b>{}</b> ({})\n\
         Entry(close): <b>{}</b>; Retest: <b>{}</b>\n\
         SL <b>{}</b> | TP <b>{}</b> | {}\n\
         EMA50 {} | EMA200 {} | RSI {:.1} | MACD {:.4} | ATR {}",
        signal.symbol,
        signal.side,
        signal.timeframe,
        fmt_price(signal.entry_close),
        fmt_price(signal.entry_retest),
        fmt_price(signal.stop_loss),
        fmt_price(signal.take_profit),
        risk_summary(signal),
        fmt_price(signal.ema_fast),
        fmt_price(signal.ema_slow),
        signal.rsi,
        signal.macd_histogram,
        fmt_price(signal.atr),
    )
}

pub fn cycle_report(signals: &[PatternSignal]) -> String {
    if signals.is_empty() {
        return "🫥 No pattern signals in this scan.".to_string();
    }
    let blocks: Vec<String> = signals.iter().map(signal_block).collect();
    format!("📊 <b>Signals found:</b>\n\n{}", blocks.join("\n\n"))
}
