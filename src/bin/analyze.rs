//! Tailwatch Analyze - rank devices that persist across captures
//!
//! Loads several Kismet captures, each labelled with where it was taken,
//! and scores every device by how often and where it reappears. Devices
//! that also show stalking indicators (many places, many appearances, more
//! than a day) are listed separately.
//!
//! Without explicit captures, every `*.kismet` file in the configured
//! directory modified within `analysis.window_hours` is read, all under one
//! location label.
//!
//! Usage:
//!   tailwatch-analyze --config config/tailwatch.toml
//!   tailwatch-analyze home.kismet=home cafe.kismet=cafe office.kismet=office

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

use tailwatch::infra::{logging, Config};
use tailwatch::io::kismet::recent_captures;
use tailwatch::io::{IgnoreLists, KismetConnector, SourceConnector};
use tailwatch::services::{IgnoreFilter, PersistenceAnalyzer, PersistenceThresholds, StalkingAssessment, SuspiciousDevice};

const DEFAULT_LOCATION: &str = "unknown_location";

/// Tailwatch Analyze - multi-capture persistence ranking
#[derive(Parser, Debug)]
#[command(name = "tailwatch-analyze", version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/tailwatch.toml")]
    config: String,

    /// Captures modified within this many hours (overrides analysis.window_hours)
    #[arg(long)]
    hours: Option<u64>,

    /// Location label for captures given without one
    #[arg(short, long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// Only report devices with stalking indicators
    #[arg(long)]
    stalking_only: bool,

    /// Captures to read, as PATH or PATH=LABEL
    captures: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_stderr();

    let result = run(&args);
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "analysis_failed");
    }
    result
}

/// Split `PATH=LABEL`; a bare path takes the default label
fn parse_capture(arg: &str, default_label: &str) -> (PathBuf, String) {
    match arg.rsplit_once('=') {
        Some((path, label)) if !path.is_empty() && !label.is_empty() => (PathBuf::from(path), label.to_string()),
        _ => (PathBuf::from(arg), default_label.to_string()),
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load_from_path(&args.config)?;

    let captures: Vec<(PathBuf, String)> = if args.captures.is_empty() {
        let hours = args.hours.unwrap_or(config.analysis().window_hours);
        let since = SystemTime::now()
            .checked_sub(Duration::from_secs(hours.saturating_mul(3600)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        recent_captures(Path::new(config.kismet_logs()), since)?
            .into_iter()
            .map(|path| (path, args.location.clone()))
            .collect()
    } else {
        args.captures.iter().map(|arg| parse_capture(arg, &args.location)).collect()
    };
    info!(captures = %captures.len(), "captures_selected");

    let lists = IgnoreLists::load(&config).context("Failed to load ignore lists")?;
    let filter = IgnoreFilter::new(lists.macs, lists.ssids);

    let mut analyzer = PersistenceAnalyzer::new(PersistenceThresholds::from(config.analysis()));
    let mut loaded = 0usize;
    for (path, label) in &captures {
        let connector = KismetConnector::new(path.clone(), config.query_timeout());
        let added = connector.connect().and_then(|db| analyzer.add_source(&db, label, &filter));
        match added {
            Ok(_) => loaded += 1,
            Err(e) => warn!(capture = %path.display(), error = %e, "capture_unreadable"),
        }
    }
    if loaded == 0 {
        anyhow::bail!("no readable captures among {} path(s)", captures.len());
    }

    let suspicious = analyzer.analyze();
    let stalking = analyzer.stalking(&suspicious);
    info!(
        appearances = %analyzer.total_appearances(),
        devices = %analyzer.unique_devices(),
        suspicious = %suspicious.len(),
        stalking = %stalking.len(),
        "analysis_complete"
    );

    print!("{}", render(&analyzer, &suspicious, &stalking, args.stalking_only));
    Ok(())
}

fn render(
    analyzer: &PersistenceAnalyzer,
    suspicious: &[SuspiciousDevice],
    stalking: &[StalkingAssessment],
    stalking_only: bool,
) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let locations: Vec<&str> = analyzer.locations().into_iter().collect();
    let _ = writeln!(
        out,
        "{} appearances of {} devices at {} location(s): {}",
        analyzer.total_appearances(),
        analyzer.unique_devices(),
        locations.len(),
        locations.join(", ")
    );

    if !stalking_only {
        if suspicious.is_empty() {
            out.push_str("\nNo persistent devices found.\n");
        } else {
            let _ = writeln!(out, "\n{} persistent devices:", suspicious.len());
            out.push_str(&"-".repeat(50));
            out.push('\n');
            for device in suspicious {
                let _ = writeln!(out, "\n{}  score={:.3}", device.mac, device.score);
                let _ = writeln!(
                    out,
                    "  first={} last={} appearances={}",
                    device.first_seen.format("%Y-%m-%d %H:%M:%S"),
                    device.last_seen.format("%Y-%m-%d %H:%M:%S"),
                    device.appearances
                );
                let locations: Vec<&str> = device.locations.iter().map(String::as_str).collect();
                let _ = writeln!(out, "  locations: {}", locations.join(", "));
                if !device.ssids.is_empty() {
                    let ssids: Vec<&str> = device.ssids.iter().map(|s| s.as_str()).collect();
                    let _ = writeln!(out, "  probed: {}", ssids.join(", "));
                }
                for reason in &device.reasons {
                    let _ = writeln!(out, "  - {reason}");
                }
            }
        }
    }

    if stalking.is_empty() {
        out.push_str("\nNo stalking patterns detected.\n");
    } else {
        let _ = writeln!(out, "\nSTALKING ALERT: {} devices with stalking patterns", stalking.len());
        for assessment in stalking {
            let _ = writeln!(out, "  {} (stalking score {:.2})", assessment.mac, assessment.score);
            for reason in &assessment.reasons {
                let _ = writeln!(out, "    - {reason}");
            }
        }
    }

    out
}
