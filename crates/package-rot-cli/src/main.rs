//! package-rot
//!
//! Command-line entry point: crawls the registry perpetually, refreshing the
//! on-disk record cache, or classifies a single package.

mod config;
mod telemetry;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use package_rot_service::{is_valid_email_syntax, user_agent, Services, ServicesBuilder};
use package_rot_store::{FileSystemStore, MemoryStore, RecordStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::AppConfig;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config", global = true)]
    config_dir: String,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development", global = true)]
    environment: String,

    /// Log level
    #[arg(long, env = "RUST_LOG", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the whole catalog forever, refreshing stale cache entries
    #[command(name = "perpetual-scraper", alias = "perpetual_scraper")]
    PerpetualScraper(ScraperArgs),

    /// Fetch one package and print its liveness report as JSON
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
struct ScraperArgs {
    /// Contact address included in the user agent
    #[arg(long, env = "PACKAGE_ROT_EMAIL")]
    email: String,

    /// Cache root directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Packages processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Minimum spacing between registry requests, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Cache entry lifetime in days
    #[arg(long)]
    ttl_days: Option<u64>,

    /// Stop after this many passes
    #[arg(long)]
    max_passes: Option<u64>,
}

#[derive(Args, Debug)]
struct ClassifyArgs {
    /// Package name
    name: String,

    /// Contact address included in the user agent
    #[arg(long, env = "PACKAGE_ROT_EMAIL")]
    email: String,

    /// Cache root directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Bypass the on-disk cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(&cli.config_dir, &cli.environment);

    if let Some(log_level) = cli.log_level {
        config.logging.level = log_level;
    }

    telemetry::init_with_config(
        telemetry::TelemetryConfig::new()
            .with_log_level(config.logging.level.clone())
            .with_json_format(config.logging.json_format)
            .with_thread_ids(config.logging.include_thread_ids)
            .with_target(config.logging.include_target),
    );

    match cli.command {
        Command::PerpetualScraper(args) => perpetual_scraper(config, args).await,
        Command::Classify(args) => classify(config, args).await,
    }
}

fn checked_user_agent(email: &str) -> Result<String> {
    if !is_valid_email_syntax(email) {
        bail!("`{}` is not a valid contact email address", email);
    }
    Ok(user_agent(email))
}

fn build_services(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<Services> {
    ServicesBuilder::new()
        .config(config.services_config())
        .store(store)
        .build()
        .context("Failed to build services")
}

async fn perpetual_scraper(mut config: AppConfig, args: ScraperArgs) -> Result<()> {
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }
    if let Some(concurrency) = args.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.registry.delay_ms = delay_ms;
    }
    if let Some(ttl_days) = args.ttl_days {
        config.cache.ttl_days = ttl_days;
    }
    if args.max_passes.is_some() {
        config.crawler.max_passes = args.max_passes;
    }

    let agent = checked_user_agent(&args.email)?;

    info!("Starting package-rot crawler");
    info!("Registry: {}", config.registry.base_url);
    info!("Cache: {}", config.cache.dir.display());
    info!(
        "Concurrency: {}, delay: {} ms, TTL: {} days",
        config.crawler.concurrency, config.registry.delay_ms, config.cache.ttl_days
    );

    let services = build_services(&config, Arc::new(FileSystemStore::new(&config.cache.dir)))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let passes = services
        .scheduler
        .run(&agent, cancel)
        .await
        .context("Crawl aborted")?;

    let stats = services.cache.stats();
    info!(
        "Crawler stopped after {} passes ({} hits, {} fetches, hit rate {:.1}%)",
        passes,
        stats.hits,
        stats.fetches,
        stats.hit_rate() * 100.0
    );
    Ok(())
}

async fn classify(mut config: AppConfig, args: ClassifyArgs) -> Result<()> {
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }
    let agent = checked_user_agent(&args.email)?;

    let store: Arc<dyn RecordStore> = if args.no_cache {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileSystemStore::new(&config.cache.dir))
    };
    let services = build_services(&config, store)?;

    let cached = services
        .cache
        .get(&args.name, &agent)
        .await
        .with_context(|| format!("Failed to retrieve {}", args.name))?;
    let report = services.classifier.classify(&cached.record, &agent).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to render report")?
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing in-flight packages");
        },
        _ = terminate => {
            info!("Received SIGTERM, finishing in-flight packages");
        },
    }
}
