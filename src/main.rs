//! Tiered Signal Trader
//!
//! Turns level/depth/code trade signals into order quantities using a tiered
//! position table, then routes them to a broker.

mod broker;
mod models;
mod trading;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::broker::{PaperBroker, SchwabClient};
use crate::models::TradeSignal;
use crate::trading::{
    Action, DecisionEngine, SignalProcessor, SizingMode, StatusSink, TracingSink, TradingConfig,
};

/// Tiered signal trading helper CLI.
#[derive(Parser)]
#[command(name = "sigtrader")]
#[command(about = "Size and route tiered trade signals", long_about = None)]
struct Cli {
    /// Trading configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, env = "SIGTRADER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Size a single signal and print the decision
    Decide {
        /// Signal payload, e.g. '{"level":"L3","depth":2,"codeNum":5,"price":"50","ticker":"TQQQ","direction":"Bull"}'
        #[arg(short, long)]
        signal: String,
    },

    /// Show current configuration
    Config,

    /// Replay newline-delimited JSON signals against a paper account
    Paper {
        /// Signal file, or '-' for stdin
        #[arg(short, long, default_value = "-")]
        signals: String,

        /// Starting paper cash in USD
        #[arg(long, default_value = "100000")]
        cash: f64,

        /// Existing holding to start from, e.g. --hold TQQQ=25 (repeatable)
        #[arg(long = "hold", value_parser = parse_holding)]
        holdings: Vec<(String, Decimal)>,

        /// Log orders without filling them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show Schwab account balances
    Account,

    /// Show Schwab positions
    Positions,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading trading config");
            TradingConfig::load(path)?
        }
        None => TradingConfig::default(),
    };
    let warnings = config.validate();
    for warning in &warnings {
        warn!("{}", warning);
    }

    let config = Arc::new(config);
    let sink: Arc<dyn StatusSink> = Arc::new(TracingSink);
    let engine = DecisionEngine::new(config.clone(), sink.clone());

    match cli.command {
        Commands::Decide { signal } => {
            let signal = TradeSignal::from_json(&signal)?;
            let decision = engine.decide(&signal);
            if decision.is_rejected() {
                warn!(ticker = %signal.ticker, "Signal rejected, no order would be sent");
            }
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }

        Commands::Config => {
            print_config(&config, &warnings);
        }

        Commands::Paper {
            signals,
            cash,
            holdings,
            dry_run,
        } => {
            let payload = read_signals(&signals)?;
            let broker = Arc::new(PaperBroker::new(Decimal::try_from(cash)?));
            for (ticker, quantity) in holdings {
                broker.seed_position(&ticker, quantity).await;
            }
            let processor =
                SignalProcessor::new(engine, sink, broker.clone(), broker.clone(), dry_run);

            let mut stats = ReplayStats::default();
            for (line_no, line) in payload.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let signal = match TradeSignal::from_json(line) {
                    Ok(signal) => signal,
                    Err(e) => {
                        warn!(line = line_no + 1, error = %e, "Skipping invalid signal");
                        stats.invalid += 1;
                        continue;
                    }
                };

                let processed = processor.process(&signal).await;
                println!("{:>4} {:<8} {}", line_no + 1, signal.ticker, processed);
                stats.record(&processed.action);
            }

            println!("\n=== Paper Replay ===");
            println!("Mode:             {}", if dry_run { "DRY RUN" } else { "PAPER FILLS" });
            println!("Submitted:        {}", stats.submitted);
            println!("Dry run:          {}", stats.dry_run);
            println!("Skipped:          {}", stats.skipped);
            println!("Failed:           {}", stats.failed);
            println!("Invalid:          {}", stats.invalid);
            let fills = broker.fills().await;
            let traded: Decimal = fills.iter().map(|f| f.notional()).sum();
            println!("Fills:            {}", fills.len());
            println!("Traded Notional:  ${:.2}", traded);
            println!("Cash:             ${:.2}", broker.cash().await);

            if !fills.is_empty() {
                println!("\n=== Fills ===");
                for fill in &fills {
                    println!(
                        "  {} {:<4} {:>6} {:<8} @ {}",
                        fill.filled_at.format("%H:%M:%S"),
                        fill.side.as_str(),
                        fill.quantity,
                        fill.ticker,
                        fill.price
                    );
                }
            }

            let positions = broker.positions().await;
            if !positions.is_empty() {
                println!("\n=== Positions ===");
                let mut tickers: Vec<_> = positions.into_iter().collect();
                tickers.sort();
                for (ticker, quantity) in tickers {
                    println!("  {:<8} {:>10}", ticker, quantity);
                }
            }
        }

        Commands::Account => {
            let client = SchwabClient::from_env().await?;
            let summary = client.account_summary().await?;

            println!("\n=== Schwab Account ===");
            println!("Cash:             ${:.2}", summary.cash);
            println!("Total Assets:     ${:.2}", summary.total_assets);
            println!("Market Value:     ${:.2}", summary.market_value);
        }

        Commands::Positions => {
            let client = SchwabClient::from_env().await?;
            let positions = client.positions().await?;

            if positions.is_empty() {
                println!("No open positions.");
                return Ok(());
            }

            println!("\n{:<8} {:>12}", "TICKER", "QTY");
            println!("{}", "-".repeat(21));
            let mut tickers: Vec<_> = positions.into_iter().collect();
            tickers.sort();
            for (ticker, quantity) in tickers {
                println!("{:<8} {:>12}", ticker, quantity);
            }
        }
    }

    Ok(())
}

/// Counters for a paper replay.
#[derive(Debug, Default)]
struct ReplayStats {
    submitted: usize,
    dry_run: usize,
    skipped: usize,
    failed: usize,
    invalid: usize,
}

impl ReplayStats {
    fn record(&mut self, action: &Action) {
        match action {
            Action::Submitted { .. } => self.submitted += 1,
            Action::DryRun { .. } => self.dry_run += 1,
            Action::Skipped { .. } => self.skipped += 1,
            Action::Failed { .. } => self.failed += 1,
        }
    }
}

fn parse_holding(raw: &str) -> Result<(String, Decimal)> {
    let (ticker, quantity) = raw
        .split_once('=')
        .context("expected TICKER=QTY")?;
    let quantity = quantity
        .trim()
        .parse::<Decimal>()
        .with_context(|| format!("invalid quantity in {}", raw))?;
    Ok((ticker.trim().to_string(), quantity))
}

fn read_signals(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read signals from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read signals from {}", source))
    }
}

fn print_config(config: &TradingConfig, warnings: &[String]) {
    println!("\n=== Trading Configuration ===\n");

    println!("Tiers:");
    for (tier, tier_config) in &config.tiers {
        println!(
            "  Tier {:<3} {:<9} depth {:?}  code {:?}",
            tier,
            if tier_config.enabled { "enabled" } else { "disabled" },
            tier_config.depth,
            tier_config.code
        );
    }

    let join = |items: &std::collections::BTreeSet<String>| {
        items.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    println!("\nUniverse:");
    println!("  Trading List:         {}", join(&config.trading_list));
    println!("  Trading Levels:       {}", join(&config.trading_levels));

    println!("\nSizing:");
    match config.sizing.mode() {
        Some(SizingMode::Fund) => println!("  Mode:                 FUND"),
        Some(SizingMode::Quantity) => println!("  Mode:                 QTY"),
        None => println!("  Mode:                 NONE"),
    }
    for ticker in &config.trading_list {
        let flags = config.direction_flags.get(ticker);
        println!(
            "  {:<8} fund ${:<10} qty/1% {:<6} buy {:<5} sell {:<5}",
            ticker,
            config.sizing.initial_fund(ticker),
            config.sizing.one_percent_qty(ticker),
            flags.map_or(true, |f| f.buy),
            flags.map_or(true, |f| f.sell),
        );
    }

    println!("\nOrders:");
    println!("  Order Type:           {:?}", config.order_type);
    println!("  Extended Hours:       {}", config.extended_hours);

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }
}
