//! Tribar CLI — scan, detect, universe and config commands.
//!
//! Commands:
//! - `scan` — run scan cycles per the configured schedule
//! - `detect` — evaluate one symbol/timeframe (or a synthetic series) and explain the verdict
//! - `universe` — print the symbols the next cycle would scan
//! - `init-config` — write a TOML file with every default spelled out

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use tribar_core::domain::{CandleSeries, Side, Timeframe};
use tribar_core::exchange::{BybitGateway, ExchangeGateway};
use tribar_core::pattern::PatternDetector;
use tribar_core::synthetic::pattern_series;
use tribar_core::universe::{select_universe, UniverseMode};
use tribar_runner::{load_dotenv, AppConfig, RunMode, Runner, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(
    name = "tribar",
    about = "Tribar — Three White Soldiers / Three Black Crows scanner"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scan cycles.
    Scan {
        /// TOML config. Defaults to ./tribar.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run a single cycle regardless of the configured mode.
        #[arg(long, conflicts_with = "run_loop")]
        once: bool,

        /// Keep scanning every `schedule.interval_seconds`.
        #[arg(long = "loop")]
        run_loop: bool,

        /// Stop after this many cycles.
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Alert only; never place orders even if AUTO_TRADE is set.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Evaluate the pattern on one series and print the verdict for each side.
    Detect {
        /// Symbol, e.g. BTCUSDT (ignored with --synthetic).
        #[arg(default_value = "BTCUSDT")]
        symbol: String,

        /// Kline interval.
        #[arg(long, default_value = "60")]
        timeframe: String,

        /// TOML config for detector settings.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use a generated series ending in the given pattern instead of the exchange.
        #[arg(long, value_enum)]
        synthetic: Option<SyntheticSide>,
    },
    /// Print the ranked universe.
    Universe {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override `universe.mode`.
        #[arg(long)]
        mode: Option<UniverseMode>,

        /// Override `universe.top_n`.
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Write a config file with all defaults.
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SyntheticSide {
    Long,
    Short,
}

impl From<SyntheticSide> for Side {
    fn from(s: SyntheticSide) -> Self {
        match s {
            SyntheticSide::Long => Side::Long,
            SyntheticSide::Short => Side::Short,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    load_dotenv();

    match cli.command {
        Commands::Scan {
            config,
            once,
            run_loop,
            max_cycles,
            dry_run,
        } => run_scan(config, once, run_loop, max_cycles, dry_run),
        Commands::Detect {
            symbol,
            timeframe,
            config,
            synthetic,
        } => run_detect(&symbol, &timeframe, config, synthetic),
        Commands::Universe { config, mode, top_n } => run_universe(config, mode, top_n),
        Commands::InitConfig { output, force } => run_init_config(&output, force),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Explicit path, else ./tribar.toml if it exists, else defaults.
fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let path = path.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let config = AppConfig::load(path.as_deref())
        .with_context(|| match &path {
            Some(p) => format!("loading {}", p.display()),
            None => "loading default configuration".to_string(),
        })?;
    Ok(config)
}

fn run_scan(
    config_path: Option<PathBuf>,
    once: bool,
    run_loop: bool,
    max_cycles: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if once {
        config.schedule.run_mode = RunMode::Once;
    } else if run_loop {
        config.schedule.run_mode = RunMode::Loop;
    }
    if dry_run {
        config.trading.auto_trade = false;
    }
    tracing::info!(
        base_url = %config.exchange.base_url,
        mode = ?config.schedule.run_mode,
        auto_trade = config.trading.auto_trade,
        timeframes = ?config.scan.timeframes,
        "starting scanner"
    );

    let runner = Runner::from_config(config)?;
    let summary = runner.run(None, max_cycles);

    println!(
        "Cycles: {}  Failed: {}  Signals: {}  Placed: {}",
        summary.cycles, summary.failed, summary.signals, summary.placed
    );
    if let Some(err) = summary.last_error {
        if summary.failed == summary.cycles {
            bail!("every scan cycle failed; last error: {err}");
        }
    }
    Ok(())
}

fn run_detect(
    symbol: &str,
    timeframe: &str,
    config_path: Option<PathBuf>,
    synthetic: Option<SyntheticSide>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let timeframe: Timeframe = timeframe.parse()?;
    let detector = PatternDetector::new(config.detector.clone());

    let (symbol, series): (String, CandleSeries) = match synthetic {
        Some(side) => ("SYNTHETIC".to_string(), pattern_series(side.into(), 300)),
        None => {
            let gateway = BybitGateway::new(config.bybit_settings(), config.circuit_breaker())?;
            let series = gateway.klines(
                &config.exchange.category,
                symbol,
                &timeframe,
                config.scan.candles_limit,
            )?;
            (symbol.to_string(), series)
        }
    };

    println!("{symbol} [{timeframe}]: {} candles", series.len());
    for side in [Side::Long, Side::Short] {
        match detector.evaluate(&symbol, &timeframe, &series, side) {
            Ok(signal) => {
                println!("  {side}: signal (R:R {:.2})", signal.risk_reward());
                println!("{}", serde_json::to_string_pretty(&signal)?);
            }
            Err(reason) => println!("  {side}: no pattern ({reason})"),
        }
    }
    Ok(())
}

fn run_universe(
    config_path: Option<PathBuf>,
    mode: Option<UniverseMode>,
    top_n: Option<usize>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(mode) = mode {
        config.universe.mode = mode;
    }
    if let Some(n) = top_n {
        config.universe.top_n = n;
    }
    let gateway = BybitGateway::new(config.bybit_settings(), config.circuit_breaker())?;
    let symbols = select_universe(&gateway, &config.universe_request())?;

    println!(
        "Universe ({} by {}): {} symbols",
        config.universe.quote,
        config.universe.mode,
        symbols.len()
    );
    for (rank, symbol) in symbols.iter().enumerate() {
        println!("{:>4}  {symbol}", rank + 1);
    }
    Ok(())
}

fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let body = AppConfig::default().to_toml_string()?;
    std::fs::write(output, body).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}
