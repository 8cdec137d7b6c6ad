//! Tailwatch Report - summarize probe requests and detections
//!
//! Reads one or more event logs written by `tailwatch` and prints per-SSID
//! probe counts and per-identity detection counts. With `--wigle`, each
//! probed SSID is also looked up on WiGLE (this spends API credits).
//!
//! Usage:
//!   tailwatch-report --config config/tailwatch.toml
//!   tailwatch-report --days 0 logs/events.jsonl logs/events-old.jsonl
//!   tailwatch-report --wigle

use chrono::{Duration, Local};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use tailwatch::domain::Ssid;
use tailwatch::infra::{logging, Config};
use tailwatch::io::{read_event_log, WigleClient};
use tailwatch::services::ProbeReport;

/// Tailwatch Report - offline event log summary
#[derive(Parser, Debug)]
#[command(name = "tailwatch-report", version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file (event log path, WiGLE credentials)
    #[arg(short, long, default_value = "config/tailwatch.toml")]
    config: String,

    /// Only include events from the past N days (0 for all)
    #[arg(short, long, default_value = "14")]
    days: u32,

    /// Look up each probed SSID on WiGLE
    #[arg(long)]
    wigle: bool,

    /// Deprecated alias for --wigle
    #[arg(long, hide = true)]
    local: bool,

    /// Event logs to read; defaults to the configured event log
    logs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_stderr();

    let config = Config::load_from_path(&args.config)?;
    let logs = if args.logs.is_empty() { vec![PathBuf::from(config.event_log())] } else { args.logs.clone() };

    let since = (args.days > 0).then(|| (Local::now() - Duration::days(i64::from(args.days))).naive_local());
    let mut report = ProbeReport::new(since);

    let mut read = 0usize;
    for path in &logs {
        match read_event_log(path) {
            Ok(contents) => {
                read += 1;
                info!(
                    path = %path.display(),
                    events = %contents.events.len(),
                    skipped = %contents.skipped,
                    "event_log_read"
                );
                report.extend(&contents.events);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "event_log_unreadable"),
        }
    }

    if read == 0 {
        anyhow::bail!("no readable event logs among {} path(s)", logs.len());
    }

    print!("{}", report.render());

    if args.local {
        warn!("--local is deprecated, use --wigle");
    }
    if args.wigle || args.local {
        print_lookups(&report, &config).await;
    } else {
        info!("wigle_lookups_disabled");
    }
    Ok(())
}

async fn print_lookups(report: &ProbeReport, config: &Config) {
    let client = match WigleClient::new(config.wigle()) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "wigle_unavailable");
            return;
        }
    };

    let ssids = report.ssids_by_count();
    info!(ssids = %ssids.len(), "wigle_lookups_enabled");
    println!("\nWiGLE lookups for {} SSIDs:", ssids.len());
    println!("{}", "-".repeat(50));

    for (i, summary) in ssids.iter().enumerate() {
        let Ok(ssid) = Ssid::parse(&summary.ssid) else {
            continue;
        };
        println!("\nSSID: {} ({}/{})", ssid, i + 1, ssids.len());
        match client.search(&ssid).await {
            Ok(found) => print!("{}", found.render()),
            Err(e) => {
                warn!(ssid = %ssid, error = %e, "wigle_lookup_failed");
                println!("WiGLE Error: {e}");
            }
        }
    }
}
