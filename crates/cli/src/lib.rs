pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quote_pricing_core::config::{LoadOptions, LogFormat, PricingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "quote-pricing",
    about = "Quote pricing and discount calculator",
    long_about = "Price pack and contract quotes from JSON documents and inspect the effective \
                  pricing configuration.",
    after_help = "Examples:\n  quote-pricing summarize --quote quote.json\n  \
                  quote-pricing summarize --quote quote.json --rates rates.json\n  \
                  quote-pricing config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute the price summary of a quote document and print it as JSON")]
    Summarize {
        #[arg(long, help = "Path to the quote JSON document")]
        quote: PathBuf,
        #[arg(long, help = "Path to a historical exchange-rate table (overrides rates.table_path)")]
        rates: Option<PathBuf>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = PricingConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Summarize { quote, rates } => commands::summarize::run(&quote, rates),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the command payload.
pub fn init_logging(config: &PricingConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
