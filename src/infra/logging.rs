//! Tracing subscriber setup
//!
//! Level is taken from `RUST_LOG` (default `info`). The daemon additionally
//! mirrors every record into a per-run plain-text file under the log dir.

use anyhow::Context;
use chrono::Local;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Per-run log file name, e.g. `tailwatch_10192026_130500.log`
pub fn run_log_name(prefix: &str) -> String {
    format!("{prefix}_{}.log", Local::now().format("%m%d%Y_%H%M%S"))
}

/// Stderr-only logging for the offline tools
pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Stderr plus a run log file in `log_dir`. Returns the file path.
pub fn init_with_file(log_dir: &Path, prefix: &str) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let path = log_dir.join(run_log_name(prefix));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_timer(UtcTime::rfc_3339()).with_target(false))
        .with(
            fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_timer(UtcTime::rfc_3339())
                .with_target(false),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_name_format() {
        let name = run_log_name("tailwatch");
        assert!(name.starts_with("tailwatch_"));
        assert!(name.ends_with(".log"));
        // tailwatch_MMDDYYYY_HHMMSS.log
        assert_eq!(name.len(), "tailwatch_".len() + 15 + ".log".len());
    }
}
