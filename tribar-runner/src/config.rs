//! Application configuration: a TOML file plus secrets from the environment.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. API keys and chat ids never live in the TOML; they come from
//! the process environment, optionally seeded from a `.env` file.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use tribar_core::domain::{EntryMode, Timeframe};
use tribar_core::exchange::{
    BybitSettings, CircuitBreaker, Credentials, OrderType, TimeInForce, DEFAULT_BASE_URL,
};
use tribar_core::pattern::{DetectorConfig, PatternDetector, MIN_HISTORY};
use tribar_core::scan::{ScanPlan, DEFAULT_CANDLES_LIMIT};
use tribar_core::trade::TradeSettings;
use tribar_core::universe::{UniverseMode, UniverseRequest};

/// Identifier of one scan cycle (hex blake3 digest).
pub type RunId = String;

pub const DEFAULT_CONFIG_FILE: &str = "tribar.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid environment variable {name}: {reason}")]
    Env { name: String, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSection {
    pub base_url: String,
    pub category: String,
    pub recv_window_ms: u64,
    pub timeout_secs: u64,
    /// Seconds requests stay blocked after the breaker trips.
    pub breaker_cooldown_secs: u64,
    pub breaker_threshold: u32,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            category: "linear".into(),
            recv_window_ms: 5000,
            timeout_secs: 30,
            breaker_cooldown_secs: 300,
            breaker_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseSection {
    pub quote: String,
    pub mode: UniverseMode,
    pub top_n: usize,
    pub vol_lookback: usize,
    pub vol_timeframe: Timeframe,
}

impl Default for UniverseSection {
    fn default() -> Self {
        Self {
            quote: "USDT".into(),
            mode: UniverseMode::Turnover,
            top_n: 100,
            vol_lookback: 96,
            vol_timeframe: Timeframe::hourly(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Priority order for the multi-timeframe fallback.
    pub timeframes: Vec<Timeframe>,
    pub candles_limit: usize,
    /// Threads for the sweep + detect phase; 1 keeps everything sequential.
    pub workers: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            timeframes: vec![Timeframe::hourly()],
            candles_limit: DEFAULT_CANDLES_LIMIT,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSection {
    pub auto_trade: bool,
    pub position_usd: f64,
    pub leverage: u32,
    pub order_type: OrderType,
    pub entry_mode: EntryMode,
    /// "GTC", "IOC" or "PostOnly".
    pub time_in_force: TimeInForce,
    pub max_open_per_symbol: usize,
    pub order_ttl_minutes: i64,
    pub reduce_only_sltp: bool,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            auto_trade: false,
            position_usd: 100.0,
            leverage: 10,
            order_type: OrderType::Limit,
            entry_mode: EntryMode::Close,
            time_in_force: TimeInForce::GoodTillCancel,
            max_open_per_symbol: 1,
            order_ttl_minutes: 60,
            reduce_only_sltp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    pub startup_message: bool,
    /// Short alert per signal on the signal channel.
    pub signal_alerts: bool,
    /// Summary of all signals (or "none found") at the end of each cycle.
    pub cycle_report: bool,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            startup_message: true,
            signal_alerts: true,
            cycle_report: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub sqlite_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    /// Suppress a (symbol, timeframe, side) already stored this many hours back; 0 disables.
    pub dedup_hours: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            sqlite_path: Some(PathBuf::from("data/signals.sqlite3")),
            csv_path: None,
            dedup_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    #[serde(alias = "ONCE")]
    Once,
    #[serde(alias = "LOOP")]
    Loop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub run_mode: RunMode,
    pub interval_seconds: u64,
    pub retry_attempts: u32,
    pub retry_backoff_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Once,
            interval_seconds: 600,
            retry_attempts: 3,
            retry_backoff_secs: 2,
        }
    }
}

/// Values read from the environment only.
#[derive(Clone, Default, PartialEq)]
pub struct Secrets {
    pub bybit_api_key: Option<String>,
    pub bybit_api_secret: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_signal_chat_id: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("bybit_api_key", &shown(&self.bybit_api_key))
            .field("bybit_api_secret", &shown(&self.bybit_api_secret))
            .field("telegram_bot_token", &shown(&self.telegram_bot_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("telegram_signal_chat_id", &self.telegram_signal_chat_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub exchange: ExchangeSection,
    pub universe: UniverseSection,
    pub scan: ScanSection,
    pub detector: DetectorConfig,
    pub trading: TradingSection,
    pub notify: NotifySection,
    pub store: StoreSection,
    pub schedule: ScheduleSection,
    #[serde(skip)]
    pub secrets: Secrets,
}

/// Load `.env` into the process environment if present.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }
}

impl AppConfig {
    /// Parse a TOML document. Secrets stay empty.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// File (if given) plus process environment, validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read secrets and the few environment overrides through `lookup`.
    ///
    /// Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(base) = get("BYBIT_BASE") {
            self.exchange.base_url = base;
        }
        self.secrets = Secrets {
            bybit_api_key: get("BYBIT_API_KEY"),
            bybit_api_secret: get("BYBIT_API_SECRET"),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            telegram_signal_chat_id: get("TELEGRAM_SIGNAL_CHAT_ID"),
        };
        if let Some(flag) = get("AUTO_TRADE") {
            self.trading.auto_trade = match flag.as_str() {
                "1" | "true" | "TRUE" => true,
                "0" | "false" | "FALSE" => false,
                other => {
                    return Err(ConfigError::Env {
                        name: "AUTO_TRADE".into(),
                        reason: format!("expected 0/1, got '{other}'"),
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.scan.timeframes.is_empty() {
            return invalid("scan.timeframes must list at least one interval");
        }
        if self.scan.candles_limit < MIN_HISTORY {
            return Err(ConfigError::Invalid(format!(
                "scan.candles_limit must be at least {MIN_HISTORY}"
            )));
        }
        if self.scan.workers == 0 {
            return invalid("scan.workers must be at least 1");
        }
        if self.universe.top_n == 0 {
            return invalid("universe.top_n must be at least 1");
        }
        if self.universe.mode == UniverseMode::Volatility && self.universe.vol_lookback < 2 {
            return invalid("universe.vol_lookback must be at least 2");
        }
        if self.trading.max_open_per_symbol == 0 {
            return invalid("trading.max_open_per_symbol must be at least 1");
        }
        if self.trading.order_ttl_minutes <= 0 {
            return invalid("trading.order_ttl_minutes must be positive");
        }
        if self.trading.auto_trade && (self.trading.position_usd.is_nan() || self.trading.position_usd <= 0.0) {
            return invalid("trading.position_usd must be positive when auto_trade is on");
        }
        let d = &self.detector;
        for (name, band) in [("long", &d.long), ("short", &d.short)] {
            if band.rsi_min > band.rsi_max {
                return Err(ConfigError::Invalid(format!(
                    "detector.{name}: rsi_min {} exceeds rsi_max {}",
                    band.rsi_min, band.rsi_max
                )));
            }
        }
        if d.sl_atr_mult <= 0.0 || d.tp_atr_mult <= 0.0 {
            return invalid("detector.sl_atr_mult and detector.tp_atr_mult must be positive");
        }
        if d.ema_fast >= d.ema_slow {
            return invalid("detector.ema_fast must be shorter than detector.ema_slow");
        }
        if self.schedule.retry_attempts == 0 {
            return invalid("schedule.retry_attempts must be at least 1");
        }
        Ok(())
    }

    /// Deterministic id for a cycle: digest of the configuration and the start time.
    pub fn run_id(&self, started_at: DateTime<Utc>) -> RunId {
        let mut hasher = blake3::Hasher::new();
        // Serialization of plain config structs does not fail; fall back to Debug if it ever does.
        let body = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        hasher.update(body.as_bytes());
        hasher.update(
            started_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_bytes(),
        );
        hasher.finalize().to_hex().to_string()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let key = self.secrets.bybit_api_key.clone()?;
        let secret = self.secrets.bybit_api_secret.clone()?;
        Credentials::new(key, secret)
    }

    pub fn bybit_settings(&self) -> BybitSettings {
        BybitSettings {
            base_url: self.exchange.base_url.clone(),
            recv_window_ms: self.exchange.recv_window_ms,
            timeout: Duration::from_secs(self.exchange.timeout_secs),
            credentials: self.credentials(),
        }
    }

    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            Duration::from_secs(self.exchange.breaker_cooldown_secs),
            self.exchange.breaker_threshold,
        ))
    }

    pub fn detector(&self) -> PatternDetector {
        PatternDetector::new(self.detector.clone())
    }

    pub fn scan_plan(&self) -> ScanPlan {
        ScanPlan {
            category: self.exchange.category.clone(),
            timeframes: self.scan.timeframes.clone(),
            candles_limit: self.scan.candles_limit,
        }
    }

    pub fn universe_request(&self) -> UniverseRequest {
        UniverseRequest {
            category: self.exchange.category.clone(),
            quote_suffix: self.universe.quote.clone(),
            top_n: self.universe.top_n,
            mode: self.universe.mode,
            timeframe: self.universe.vol_timeframe.clone(),
            vol_lookback: self.universe.vol_lookback,
        }
    }

    pub fn trade_settings(&self) -> TradeSettings {
        TradeSettings {
            category: self.exchange.category.clone(),
            position_usd: self.trading.position_usd,
            leverage: self.trading.leverage,
            order_type: self.trading.order_type,
            entry_mode: self.trading.entry_mode,
            time_in_force: self.trading.time_in_force,
            max_open_per_symbol: self.trading.max_open_per_symbol,
            reduce_only_stops: self.trading.reduce_only_sltp,
        }
    }

    pub fn order_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.trading.order_ttl_minutes)
    }
}
