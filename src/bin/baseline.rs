//! Tailwatch Baseline - build ignore lists from a quiet capture
//!
//! Reads every device and probed SSID the configured source has ever seen
//! and writes them to the MAC and SSID ignore lists. Run it against a capture
//! taken somewhere you are not being followed (home, office) so normal
//! neighbours never raise detections.
//!
//! Usage:
//!   tailwatch-baseline --config config/tailwatch.toml
//!   tailwatch-baseline --capture kismet_logs/Kismet-20250101.kismet --merge

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use tailwatch::infra::{logging, Config, SourceKind};
use tailwatch::io::ignore_list::{self, collect_baseline, IgnoreLists};
use tailwatch::io::{KismetConnector, MemorySource, SourceConnector};

/// Tailwatch Baseline - write ignore lists from everything seen so far
#[derive(Parser, Debug)]
#[command(name = "tailwatch-baseline", version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/tailwatch.toml")]
    config: String,

    /// Read this Kismet capture instead of discovering the newest one
    #[arg(long)]
    capture: Option<PathBuf>,

    /// Keep entries already in the ignore lists
    #[arg(short, long)]
    merge: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_stderr();

    let result = run(&args);
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "baseline_failed");
    }
    result
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load_from_path(&args.config)?;

    let mut lists = match (&args.capture, config.source_kind()) {
        (Some(capture), _) => {
            let connector = KismetConnector::new(capture.clone(), config.query_timeout());
            collect_baseline(&connector.connect()?)?
        }
        (None, SourceKind::Kismet) => {
            let connector = KismetConnector::discover(config.kismet_logs(), config.query_timeout())?;
            collect_baseline(&connector.connect()?)?
        }
        (None, SourceKind::Replay) => collect_baseline(&MemorySource::load_jsonl(config.replay_file())?)?,
    };
    info!(macs = %lists.macs.len(), ssids = %lists.ssids.len(), "baseline_collected");

    if args.merge {
        lists = merge_existing(lists, &config)?;
    }

    let macs = ignore_list::save_mac_list(&lists.macs, Path::new(config.mac_list()))
        .context("Failed to write MAC ignore list")?;
    let ssids = ignore_list::save_ssid_list(&lists.ssids, Path::new(config.ssid_list()))
        .context("Failed to write SSID ignore list")?;

    info!(
        macs = %macs,
        ssids = %ssids,
        mac_list = %config.mac_list(),
        ssid_list = %config.ssid_list(),
        "baseline_written"
    );
    Ok(())
}

fn merge_existing(collected: IgnoreLists, config: &Config) -> anyhow::Result<IgnoreLists> {
    let existing = IgnoreLists::load(config)?;

    let macs: BTreeSet<_> = existing.macs.into_iter().chain(collected.macs).collect();
    let ssids: BTreeSet<_> = existing.ssids.into_iter().chain(collected.ssids).collect();

    info!(macs = %macs.len(), ssids = %ssids.len(), "baseline_merged");
    Ok(IgnoreLists { macs: macs.into_iter().collect(), ssids: ssids.into_iter().collect() })
}
