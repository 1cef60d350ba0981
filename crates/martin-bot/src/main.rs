//! MARTIN - automated trading assistant for hourly up/down prediction
//! markets.

use anyhow::Result;
use clap::{Parser, Subcommand};
use martin_bot::{commands, App, AppConfig};
use martin_ledger::Ledger;
use tracing::info;

/// Automated trading assistant for hourly up/down prediction markets.
#[derive(Parser, Debug)]
#[command(name = "martin", version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MARTIN_CONFIG).
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the trading engine (default).
    Run,
    /// Pause discovery and signal search.
    Pause,
    /// Resume a paused bot.
    Resume,
    /// Print stats and live trades.
    Status,
    /// Print recently closed trades and total pnl.
    Report {
        /// How many closed trades to include.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Store a persistent settings override (applies at next start or
    /// next cycle for runtime-read keys).
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    martin_telemetry::init_logging()?;

    let config_path = args
        .config
        .or_else(|| std::env::var("MARTIN_CONFIG").ok())
        .unwrap_or_else(|| "config/martin.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    let now = chrono::Utc::now().timestamp();
    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Starting MARTIN v{}", env!("CARGO_PKG_VERSION"));
            let (_app, run) = App::build(config)?;
            run.run().await?;
        }
        Command::Pause => commands::pause(&open_ledger(&config)?, now)?,
        Command::Resume => commands::resume(&open_ledger(&config)?, now)?,
        Command::Status => commands::status(&open_ledger(&config)?)?,
        Command::Report { limit } => commands::report(&open_ledger(&config)?, limit)?,
        Command::Set { key, value } => {
            commands::set(&open_ledger(&config)?, &key, &value, now)?
        }
    }

    Ok(())
}

fn open_ledger(config: &AppConfig) -> Result<Ledger> {
    Ok(Ledger::open(&config.ledger.path)?)
}
