use clap::{Parser, Subcommand};
use overheat_core::{
    CheckCycle, CoinGecko, Config, FileHistoryStore, Glassnode, JsonFileStore, LastRun,
    LastRunStore, NotificationDispatcher, Scheduler,
    notify::{EmailNotifier, ServerChanNotifier},
    source::glassnode::DEFAULT_METRIC_TIMEOUT,
};
use std::{error::Error, sync::Arc};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "overheat-server")]
#[command(about = "BTC/ETH overheat monitor - scores market positioning and alerts on extremes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run check cycles on the configured fixed interval until Ctrl-C (default)
    Run {
        /// Also run one cycle immediately on startup
        #[arg(long)]
        now: bool,
    },

    /// Run exactly one check cycle now and print the report as JSON
    Check,

    /// Show the most recent completed check cycle
    Last {
        /// Print the raw snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = Arc::new(Config::from_env()?);
    let files = Arc::new(JsonFileStore::open(&config.data_dir)?);
    let last_run = LastRunStore::new(files.clone());

    match cli.command.unwrap_or(Commands::Run { now: false }) {
        Commands::Last { json } => {
            match last_run.load() {
                Some(snapshot) if json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                Some(snapshot) => print_last_run(&snapshot),
                None => println!("no check recorded yet"),
            }
            Ok(())
        }
        Commands::Check => {
            let scheduler = Scheduler::new(build_cycle(&config, files, last_run)?)
                .with_lock_dir(&config.data_dir)?;
            let report = scheduler.trigger().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Run { now } => {
            let scheduler = Scheduler::new(build_cycle(&config, files, last_run)?)
                .with_lock_dir(&config.data_dir)?;

            if now {
                if let Err(error) = scheduler.trigger().await {
                    error!(%error, "startup check cycle failed");
                }
            }

            let handle = scheduler.start(config.interval)?;
            info!(
                interval_minutes = config.interval.as_secs() / 60,
                assets = config.assets.len(),
                "monitor running, press Ctrl-C to stop"
            );

            tokio::signal::ctrl_c().await?;
            info!("shutdown requested, waiting for in-flight cycle");
            handle.shutdown().await;
            Ok(())
        }
    }
}

/// Wire the concrete data sources, stores and channels into a [`CheckCycle`].
fn build_cycle(
    config: &Config,
    files: Arc<JsonFileStore>,
    last_run: LastRunStore,
) -> Result<Arc<CheckCycle>, Box<dyn Error>> {
    let prices = Arc::new(CoinGecko::new(config.http_timeout)?);
    let metrics = Arc::new(Glassnode::new(
        config.glassnode_api_key.clone(),
        DEFAULT_METRIC_TIMEOUT,
    )?);
    let history = Arc::new(FileHistoryStore::new(files, config.history_capacity));

    let mut dispatcher = NotificationDispatcher::new(config.thresholds);
    if let Some(email) = config.email.clone() {
        match EmailNotifier::new(email) {
            Ok(notifier) => dispatcher = dispatcher.with_channel(Box::new(notifier)),
            Err(error) => warn!(%error, "email channel disabled"),
        }
    }
    if let Some(serverchan) = config.serverchan.clone() {
        match ServerChanNotifier::new(serverchan, config.http_timeout) {
            Ok(notifier) => dispatcher = dispatcher.with_channel(Box::new(notifier)),
            Err(error) => warn!(%error, "serverchan channel disabled"),
        }
    }
    info!(channels = dispatcher.channel_count(), "notification channels ready");

    Ok(Arc::new(CheckCycle::new(
        config,
        prices,
        metrics,
        history,
        last_run,
        dispatcher,
    )))
}

fn print_last_run(snapshot: &LastRun) {
    println!(
        "Last check: {}",
        snapshot.time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for record in &snapshot.results {
        let price = record
            .price
            .map(|price| format!("{price:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {:<6} price {:>12}  score {:>5.1}  {}",
            record.symbol, price, record.score.score, record.state
        );
    }
    if snapshot.alerts.is_empty() {
        println!("No alerts raised.");
    } else {
        for alert in &snapshot.alerts {
            println!("  ALERT {} {}", alert.kind, alert.record.symbol);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::filter::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::fmt()
            // Filter messages based on the INFO level
            .with_env_filter(filter)
            .json()
            // Install this Tracing subscriber as global default
            .init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            // Disable colours on release builds
            .with_ansi(cfg!(debug_assertions))
            .init()
    }
}
