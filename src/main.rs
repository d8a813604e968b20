//! Slack Timeline - Entry Point
//!
//! Loads configuration, wires the relay pipeline and runs it until Ctrl-C
//! or a fatal error.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use slack_timeline::slack::install_crypto_provider;
use slack_timeline::{
    Config, Coordinator, MessageFilter, MessageStore, RelayLedger, RtmConnector, SlackClient,
    StreamWorker, UserDirectory,
};
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    install_crypto_provider();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let json_logs = args.iter().any(|a| a == "--json-logs" || a == "-j");
    let config_path = args
        .iter()
        .position(|a| a == "--config" || a == "-c")
        .map(|i| {
            args.get(i + 1)
                .map(PathBuf::from)
                .context("--config requires a path")
        })
        .transpose()?;

    if help_mode {
        println!("Slack Timeline v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: slack-timeline [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config, -c <path>  JSON config file");
        println!("  --json-logs, -j      Log to stderr as JSON");
        println!("  --help, -h           Show this help");
        println!();
        println!("Environment variables (override the config file):");
        println!("  SLACK_TOKEN                  Slack API token");
        println!("  SLACK_TIMELINE_CHANNEL_ID    Timeline channel id");
        println!("  SLACK_BLACKLIST_CHANNEL_IDS  Comma separated channel ids to skip");
        println!("  TIMELINE_DB_PATH             Relay database path");
        println!("  TIMELINE_MAX_ATTEMPTS        Attempts per API call (default: 10)");
        println!("  TIMELINE_USER_CACHE_TTL      User cache TTL in seconds");
        return Ok(());
    }

    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        // Supervised mode - log to stderr as JSON
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let config = match config_path {
        Some(path) => {
            let mut config = Config::from_file(&path)?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::from_env()?,
    };
    config.validate()?;

    info!("Slack Timeline v{}", env!("CARGO_PKG_VERSION"));
    info!("Timeline channel: {}", config.timeline_channel_id);

    let api = Arc::new(SlackClient::http(
        &config.slack_api_token,
        &config.api_base_url,
        config.retry_policy(),
    ));
    let users = Arc::new(UserDirectory::new(api.clone(), config.user_cache_ttl()));
    let ledger = RelayLedger::open(&config.db_path)?;
    let messages = Arc::new(MessageStore::new(
        &config.timeline_channel_id,
        api.clone(),
        ledger,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = StreamWorker::new(Arc::new(RtmConnector::new(api)), shutdown_rx);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Dropping the sender would read as a shutdown request
                error!("Failed to listen for Ctrl-C: {}", e);
                let _keep_alive = shutdown_tx;
                std::future::pending::<()>().await
            }
        }
    });

    let filter = MessageFilter::new(&config.timeline_channel_id, config.blacklist_channel_ids);
    let mut coordinator = Coordinator::new(filter, users, messages);

    if let Err(e) = coordinator.run(Box::new(worker)).await {
        error!("Relay stopped: {}", e);
        return Err(e.into());
    }

    info!("Relay stopped");
    Ok(())
}
