use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cvm_fundamentals::collector::Collector;
use cvm_fundamentals::dashboard;
use cvm_fundamentals::models::{Config, Timeframe};
use cvm_fundamentals::processor::Processor;
use cvm_fundamentals::quotes::{self, TerminalBridge};
use cvm_fundamentals::storage::Store;

#[derive(Parser)]
#[command(
    name = "cvm-fundamentals",
    about = "Fundamental analysis pipeline for Brazilian equities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download DFP archives and the company registry for a year range
    Collect {
        #[arg(long)]
        start_year: u16,
        #[arg(long)]
        end_year: u16,
        /// Re-download years that are already cached
        #[arg(long)]
        force: bool,
    },
    /// Parse cached archives and compute indicator tables
    Process,
    /// Fetch OHLCV bars for tickers from the terminal bridge
    Quotes {
        /// Ticker symbols, e.g. PETR4 VALE3
        #[arg(required = true)]
        tickers: Vec<String>,
        /// Bar timeframe: M1 M5 M15 M30 H1 H4 D1 W1 MN1
        #[arg(long, default_value = "D1")]
        timeframe: String,
    },
    /// Serve the read-only dashboard API
    Dashboard {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cvm_fundamentals=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let store = Store::open(config.data_dir.clone())?;

    match cli.command {
        Command::Collect {
            start_year,
            end_year,
            force,
        } => {
            anyhow::ensure!(
                start_year <= end_year,
                "start year {start_year} is after end year {end_year}"
            );
            let collector = Collector::new(&config, store)?;
            // A missing registry only widens processing to all companies.
            if let Err(e) = collector.collect_registry().await {
                tracing::warn!("company registry unavailable: {e}");
            }
            let summary = collector.collect(start_year, end_year, force).await?;
            summary.print();
            if summary.is_total_failure() {
                std::process::exit(1);
            }
        }
        Command::Process => {
            let summary = Processor::new(store).run()?;
            summary.print();
            if summary.is_total_failure() {
                std::process::exit(1);
            }
        }
        Command::Quotes { tickers, timeframe } => {
            let timeframe: Timeframe = timeframe
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let bridge = TerminalBridge::new(&config)?;
            let summary = quotes::fetch_and_store(&bridge, &store, &tickers, timeframe).await?;
            summary.print();
            if summary.is_total_failure() {
                std::process::exit(1);
            }
        }
        Command::Dashboard { port } => {
            dashboard::serve(store, port).await?;
        }
    }

    Ok(())
}
