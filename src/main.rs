use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use time::UtcOffset;
use tokio::time::timeout;
use tracing::warn;

use qn_scale::history::{format_date, local_offset, now_millis};
use qn_scale::{
    events, init_tracing, Config, Datapoint, HistoryStore, Progress, ScaleScanner, SessionOptions,
};

#[derive(Parser)]
#[command(name = "qn-scale")]
#[command(author, version, long_about = None)]
#[command(about = "Track weight with a QN-Scale Bluetooth scale")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look for the scale and report whether it was found
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Connect, wait for a settled reading and show progress
    Weigh {
        /// Append the settled reading to the history
        #[arg(short, long)]
        save: bool,

        /// Give up if no settled reading arrives within this many seconds
        #[arg(short, long, default_value = "120")]
        timeout: u64,
    },

    /// Print saved weigh-ins
    History {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show change since the first and the last saved weigh-in
    Progress,

    /// Delete all saved weigh-ins
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    // Read before any worker threads exist.
    let offset = local_offset();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?
        .block_on(run(cli, offset))
}

async fn run(cli: Cli, offset: UtcOffset) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let store = HistoryStore::open(config.history_path()?);

    match cli.command {
        Commands::Scan { timeout } => scan(&config, timeout).await,
        Commands::Weigh { save, timeout } => {
            weigh(&config, &store, save, Duration::from_secs(timeout), offset).await
        }
        Commands::History { json } => history(&store, json, offset),
        Commands::Progress => {
            let data = store.load()?;
            let now = now_millis();
            print_progress(&Progress::compute(&data, None, now), now, offset);
            Ok(())
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("This deletes all saved weigh-ins; pass --yes to confirm");
            }
            store.reset()?;
            println!("Data reset");
            Ok(())
        }
    }
}

async fn scan(config: &Config, timeout_secs: Option<u64>) -> Result<()> {
    let scan_timeout = timeout_secs.map_or_else(|| config.scan_timeout(), Duration::from_secs);
    let scanner = ScaleScanner::new(&config.device_name).await?;
    scanner.find_scale(scan_timeout).await?;
    println!("Found {}", config.device_name);
    Ok(())
}

async fn weigh(
    config: &Config,
    store: &HistoryStore,
    save: bool,
    limit: Duration,
    offset: UtcOffset,
) -> Result<()> {
    let scanner = ScaleScanner::new(&config.device_name).await?;
    let scale = Arc::new(
        scanner
            .find_scale(config.scan_timeout())
            .await
            .context("Step on the scale to wake it up")?,
    );

    let (tx, mut rx) = events::channel();
    let handle = Arc::clone(&scale)
        .connect(SessionOptions::from(config), tx)
        .await
        .context("Failed to connect to scale")?;

    // Returns only after the stop acknowledgement has gone out.
    let outcome = timeout(limit, events::settled_weight(&mut rx)).await;

    if scale.is_connected().await {
        if let Err(e) = scale.disconnect().await {
            warn!("Failed to disconnect: {}", e);
        }
    }
    handle.abort();

    let kg = match outcome {
        Ok(Some(kg)) => kg,
        Ok(None) => bail!("Scale disconnected before a settled reading"),
        Err(_) => bail!("No settled reading within {:?}", limit),
    };

    let candidate = Datapoint::reading(kg);
    println!("{:.2} {}", candidate.weight, candidate.unit);

    let data = store.load()?;
    let now = candidate.timestamp;
    print_progress(&Progress::compute(&data, Some(&candidate), now), now, offset);

    if save {
        store.append(candidate)?;
        println!("Saved");
    }
    Ok(())
}

fn history(store: &HistoryStore, json: bool, offset: UtcOffset) -> Result<()> {
    let data = store.load()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }
    if data.is_empty() {
        println!("No saved weigh-ins");
    }
    for datapoint in &data {
        println!(
            "{}  {:.2} {}",
            format_date(datapoint.timestamp, offset),
            datapoint.weight,
            datapoint.unit
        );
    }
    Ok(())
}

fn print_progress(progress: &Progress, now_ms: i64, offset: UtcOffset) {
    println!("{}", progress.since_beginning.describe("beginning", now_ms, offset));
    if let Some(change) = &progress.since_last_checkin {
        println!("{}", change.describe("last checkin", now_ms, offset));
    }
}
