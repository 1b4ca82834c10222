mod metrics;
mod wishlist;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use digger_core::{
    load_config, validate_config, AcquisitionEngine, Config, DownloadMonitor, EventBus, LogFormat,
    ReputationTracker, SanitizedConfig, SelectionCache, SlskdClient, SqliteReputationStore,
};

use wishlist::Wishlist;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("DIGGER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(&config);
    info!("digger {} starting", VERSION);
    info!("Configuration loaded from {:?}", config_path);
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    // Reputation store
    let store = SqliteReputationStore::new(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;
    let reputation = Arc::new(ReputationTracker::new(
        Arc::new(store),
        config.reputation.clone(),
    ));
    info!(
        "Reputation store initialized (tracking {})",
        if reputation.is_enabled() { "enabled" } else { "disabled" }
    );

    // slskd serves both searches and downloads
    let slskd = Arc::new(
        SlskdClient::new(config.slskd.clone()).context("Failed to create slskd client")?,
    );
    info!("Using slskd at {}", config.slskd.url);

    let events = EventBus::new();
    let monitor = Arc::new(DownloadMonitor::new(
        slskd.clone(),
        reputation.clone(),
        events.clone(),
        config.monitor.clone(),
    ));
    let selections = Arc::new(SelectionCache::new(config.selection.cache_config()));

    let shutdown = CancellationToken::new();
    let engine = Arc::new(
        AcquisitionEngine::new(
            slskd.clone(),
            slskd,
            reputation,
            selections.clone(),
            monitor.clone(),
            events,
            config.selection.mode,
        )
        .with_shutdown(shutdown.clone()),
    );
    info!("Acquisition engine ready ({:?} mode)", engine.mode());

    let mut handles = Vec::new();

    {
        let monitor = monitor.clone();
        let cancel = shutdown.clone();
        handles.push(tokio::spawn(async move { monitor.run(cancel).await }));
    }
    {
        let sweep_interval = config.selection.sweep_interval();
        let cancel = shutdown.clone();
        handles.push(tokio::spawn(async move {
            selections.run_sweeper(sweep_interval, cancel).await
        }));
    }
    handles.push(tokio::spawn(log_events(
        engine.clone(),
        monitor,
        shutdown.clone(),
    )));

    if let Some(wishlist_config) = config.wishlist.clone() {
        let wishlist = Wishlist::load(&wishlist_config.path)?;
        let search_config = config.effective_search_config();
        let engine = engine.clone();
        let cancel = shutdown.clone();
        handles.push(tokio::spawn(async move {
            wishlist::process(
                engine,
                wishlist,
                search_config,
                wishlist_config.concurrency,
                cancel,
            )
            .await;
        }));
    } else {
        info!("No wishlist configured");
    }

    shutdown_signal().await;
    info!("Shutting down...");
    shutdown.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    debug!("Final metrics:\n{}", metrics::encode_metrics());
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Log engine events and keep the download gauge current.
async fn log_events(
    engine: Arc<AcquisitionEngine>,
    monitor: Arc<DownloadMonitor>,
    cancel: CancellationToken,
) {
    let mut rx = engine.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(envelope) => {
                    debug!(
                        event_id = envelope.id,
                        kind = envelope.event.kind(),
                        "{}",
                        serde_json::to_string(&envelope.event).unwrap_or_default()
                    );
                    metrics::ACTIVE_DOWNLOADS.set(monitor.active_count().await as i64);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
