//! Tailwatch - wireless tailing detector
//!
//! Polls a device-sighting store and flags MACs and probed SSIDs that keep
//! reappearing across non-adjacent time bands.
//!
//! Module structure:
//! - `domain/` - Core types (identities, sightings, bands, events)
//! - `io/` - External interfaces (Kismet, replay, ignore lists, event log)
//! - `services/` - Tracking engine (filter, bands, detector, monitor)
//! - `infra/` - Infrastructure (config, metrics, logging, shutdown)

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tailwatch::infra::{logging, shutdown, Config, Metrics, SourceKind};
use tailwatch::io::{IgnoreLists, KismetConnector, MemorySource, SourceConnector};
use tailwatch::services::{IgnoreFilter, Monitor};
use tracing::{error, info, warn};

/// Tailwatch - detect devices that follow you around
#[derive(Parser, Debug)]
#[command(name = "tailwatch", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/tailwatch.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Config comes first: the run log location is part of it
    let config = Config::load_from_path(&args.config)?;

    let log_file = logging::init_with_file(Path::new(config.log_dir()), "tailwatch")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        log_file = %log_file.display(),
        "tailwatch starting"
    );

    if config.is_default() {
        warn!(path = %args.config, "config_not_found_using_defaults");
    }

    let result = run(&config).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "tailwatch_failed");
    }
    result
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let windows = config.time_windows();
    info!(
        config_file = %config.config_file(),
        check_interval_secs = %config.check_interval_secs(),
        rotation = ?config.rotation(),
        list_update_interval = %config.list_update_interval(),
        windows = %format!(
            "{}/{}/{}/{}/{}",
            windows.current, windows.recent, windows.medium, windows.old, windows.oldest
        ),
        source = ?config.source_kind(),
        event_log = %config.event_log(),
        "config_loaded"
    );

    let lists = IgnoreLists::load(config)?;
    info!(macs = %lists.macs.len(), ssids = %lists.ssids.len(), "ignore_lists_loaded");
    let filter = IgnoreFilter::new(lists.macs, lists.ssids);

    match config.source_kind() {
        SourceKind::Kismet => {
            let connector = KismetConnector::discover(config.kismet_logs(), config.query_timeout())
                .context("Fatal error during initialization")?;
            connector
                .connect()
                .and_then(|db| db.validate())
                .context("Database validation failed")?;
            run_monitor(connector, config, filter).await
        }
        SourceKind::Replay => {
            let source = MemorySource::load_jsonl(config.replay_file())?;
            source.rebase(Utc::now());
            run_monitor(source, config, filter).await
        }
    }
}

async fn run_monitor<C: SourceConnector>(
    connector: C,
    config: &Config,
    filter: IgnoreFilter,
) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new());
    let mut monitor = Monitor::start(connector, config, filter, metrics, Utc::now())
        .context("Fatal error during initialization")?;

    // Ctrl+C or SIGTERM
    let shutdown_rx = shutdown::spawn_listener();

    monitor.run(shutdown_rx).await;

    info!("tailwatch shutdown complete");
    Ok(())
}
