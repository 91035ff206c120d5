use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;
use std::time::Duration;
use stockdash::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount into the base currency
    Convert {
        amount: Decimal,
        currency: String,
    },
    /// Show the current rate table
    Rates {
        /// Fetch a fresh table from the provider
        #[arg(short, long)]
        refresh: bool,
    },
    /// Show quotes with prices in the base currency
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Search ticker symbols
    Search { query: String },
    /// Refresh quotes on a fixed interval until Ctrl-C
    Watch {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Seconds between refreshes, overrides the configuration
        #[arg(short, long)]
        interval_secs: Option<u64>,
    },
}

impl From<Commands> for stockdash::AppCommand {
    fn from(cmd: Commands) -> stockdash::AppCommand {
        match cmd {
            Commands::Convert { amount, currency } => {
                stockdash::AppCommand::Convert { amount, currency }
            }
            Commands::Rates { refresh } => stockdash::AppCommand::Rates { refresh },
            Commands::Quote { symbols } => stockdash::AppCommand::Quote { symbols },
            Commands::Search { query } => stockdash::AppCommand::Search { query },
            Commands::Watch {
                symbols,
                interval_secs,
            } => stockdash::AppCommand::Watch {
                symbols,
                interval: interval_secs.map(Duration::from_secs),
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => stockdash::cli::setup::setup(),
        Some(cmd) => stockdash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
