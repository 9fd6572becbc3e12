use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tsig::config::{EngineConfig, load_config};
use tsig::pipeline::{SignalEngine, validate_config};

#[derive(Parser, Debug)]
#[command(name = "tsig", about = "Event, holiday and long-holiday signals per date")]
struct Cli {
    /// TOML config; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Large-scale events running on a date.
    Events {
        #[arg(long)]
        date: NaiveDate,
    },
    /// Calendar signals only; no event pages are fetched.
    Holidays {
        #[arg(long)]
        date: NaiveDate,
    },
    Signals {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    Validate,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    if let Commands::Validate = cli.command {
        for line in validate_config(cli.config.as_deref())? {
            println!("{line}");
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let engine = SignalEngine::new(config)?;

    match cli.command {
        Commands::Events { date } => {
            let events = engine.events_for(date);
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        Commands::Holidays { date } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&engine.calendar_signals(date))?
            );
        }
        Commands::Signals { date, until } => {
            let until = until.unwrap_or(date);
            if until < date {
                bail!("--until {until} is before --date {date}");
            }
            let days = engine.signals_for_range(date, until);
            info!(from = %date, to = %until, days = days.len(), "signals complete");
            println!("{}", serde_json::to_string_pretty(&days)?);
        }
        Commands::Validate => {}
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
