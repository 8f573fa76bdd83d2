use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pricewatch_client::{ReqwestFetcher, StorefrontParser, WebhookNotifier};
use pricewatch_core::config::MonitorConfig;
use pricewatch_core::orchestrator::{Monitor, TracingCycleReporter};
use pricewatch_core::retry::{RetryPolicy, RetryingFetcher};
use pricewatch_core::traits::{Notifier, NullNotifier, StateStore};
use pricewatch_store::{Storage, StoreConfig};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Storefront discount monitor")]
struct Cli {
    /// Path to the JSON monitor configuration
    #[arg(
        short,
        long,
        global = true,
        env = "PRICEWATCH_CONFIG",
        default_value = "config/categories.json"
    )]
    config: PathBuf,

    /// Directory for price history and category state files
    #[arg(long, global = true, env = "PRICEWATCH_STATE_DIR", default_value = "state")]
    state_dir: PathBuf,

    /// Report CSV path (defaults to <state dir>/price_changes.csv)
    #[arg(long, global = true, env = "PRICEWATCH_REPORT")]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor every configured category until interrupted
    Run {
        /// Webhook URL for notifications (notifications are skipped if unset)
        #[arg(long, env = "PRICEWATCH_WEBHOOK_URL")]
        webhook_url: Option<String>,

        /// Run a single cycle and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },

    /// List configured categories with their tracked item counts
    Categories,

    /// Show the price history of one product or variant id
    History {
        /// Product id (variant ids look like `<id>_<variant>`)
        #[arg(short, long)]
        id: String,

        /// Number of most recent samples to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config, &cli.state_dir)?;
    let storage = open_storage(&cli.state_dir, cli.report.as_deref())?;

    match cli.command {
        Commands::Run { webhook_url, once } => match webhook_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let notifier =
                    WebhookNotifier::new(&url).context("Failed to create webhook client")?;
                cmd_run(config, &storage, notifier, once).await?;
            }
            None => {
                tracing::warn!("PRICEWATCH_WEBHOOK_URL not set, notifications are disabled");
                cmd_run(config, &storage, NullNotifier, once).await?;
            }
        },
        Commands::Categories => cmd_categories(&config, &storage)?,
        Commands::History { id, limit } => cmd_history(&id, limit, &storage)?,
    }

    Ok(())
}

/// Load and validate the monitor configuration, resolving relative state
/// file paths against the state directory.
fn load_config(path: &Path, state_dir: &Path) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    config.resolve_state_paths(state_dir);
    Ok(config)
}

fn open_storage(state_dir: &Path, report: Option<&Path>) -> Result<Storage> {
    let mut store_config = StoreConfig::new(state_dir);
    if let Some(report) = report {
        store_config = store_config.with_report_file(report);
    }
    Storage::open(store_config).context("Failed to prepare state directory")
}

/// Cancel `token` on SIGINT or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        token.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn cmd_run<N: Notifier>(
    config: MonitorConfig,
    storage: &Storage,
    notifier: N,
    once: bool,
) -> Result<()> {
    let settings = config.settings.clone();
    let fetcher = ReqwestFetcher::from_settings(&settings).context("Failed to create HTTP client")?;
    let fetcher = RetryingFetcher::new(
        fetcher,
        RetryPolicy::new(settings.fetch_retries, settings.fetch_backoff),
    );

    let monitor = Monitor::new(
        config,
        fetcher,
        StorefrontParser::new(),
        storage.state_store(),
        storage.report_log(),
        notifier,
    );

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());
    let reporter = TracingCycleReporter;

    if once {
        tokio::select! {
            result = monitor.run_cycle(1, &reporter) => {
                let summary = result.map_err(|e| anyhow::anyhow!(e))?;
                println!("{}", summary.status_line());
            }
            () = cancel.cancelled() => {
                tracing::info!("Cycle interrupted");
            }
        }
        return Ok(());
    }

    monitor
        .run(cancel, &reporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

fn cmd_categories(config: &MonitorConfig, storage: &Storage) -> Result<()> {
    let store = storage.state_store();

    println!("Configured categories:\n");
    for category in &config.categories {
        let state = store
            .load_category(category)
            .map_err(|e| anyhow::anyhow!(e))?;
        println!(
            "  {:<24} {:>5} tracked  min {:>4.0}% off  {}",
            category.name,
            state.len(),
            category.min_discount_pct,
            category.listing_url
        );
    }
    println!("\nTotal: {} categories", config.categories.len());

    Ok(())
}

fn cmd_history(id: &str, limit: usize, storage: &Storage) -> Result<()> {
    let history = storage
        .state_store()
        .load_history()
        .map_err(|e| anyhow::anyhow!(e))?;

    let Some(entry) = history.get(id) else {
        println!("No price history found for id={id}");
        return Ok(());
    };

    println!("Price history for {} ({id}):\n", entry.name);
    println!("  Initial price:  £{:.2}", entry.initial_price);
    println!(
        "  Reduction:      {:.1}%{}",
        entry.reduction_from_initial_pct,
        if entry.recently_reduced {
            " (recently reduced)"
        } else {
            ""
        }
    );
    println!();

    for sample in entry.price_samples.iter().rev().take(limit) {
        println!(
            "  {}  £{:.2}",
            sample.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            sample.price
        );
    }

    println!("\nTotal: {} samples", entry.price_samples.len());

    Ok(())
}
