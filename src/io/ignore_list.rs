//! Ignore-list files
//!
//! Two accepted formats:
//! - a JSON array of strings (what `save_*` writes)
//! - a legacy assignment, `ignore_list = ['AA:BB:..', ...]` for MACs or
//!   `non_alert_ssid_list = ['home', ...]` for SSIDs
//!
//! Every entry is validated; invalid entries are skipped with a warning.

use crate::domain::{MacAddress, SourceError, Ssid, TimeRange};
use crate::infra::Config;
use crate::io::source::{probes_from, SightingSource};
use anyhow::{anyhow, Context};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Variable name used by legacy MAC list files
pub const MAC_LIST_VAR: &str = "ignore_list";
/// Variable name used by legacy SSID list files
pub const SSID_LIST_VAR: &str = "non_alert_ssid_list";

/// Both operator ignore lists, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct IgnoreLists {
    pub macs: Vec<MacAddress>,
    pub ssids: Vec<Ssid>,
}

impl IgnoreLists {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let macs = load_mac_list(Path::new(config.mac_list()))?;
        let ssids = load_ssid_list(Path::new(config.ssid_list()))?;
        Ok(Self { macs, ssids })
    }
}

/// Everything the source has ever seen: every MAC and every non-empty probed
/// SSID, sorted and deduplicated. Used to build lists from a quiet capture.
pub fn collect_baseline<S: SightingSource + ?Sized>(source: &S) -> Result<IgnoreLists, SourceError> {
    let devices = source.devices_between(TimeRange::all())?;
    let probes = probes_from(&devices);

    let macs: BTreeSet<MacAddress> = devices.iter().map(|s| s.mac.clone()).collect();
    let ssids: BTreeSet<Ssid> = probes.iter().map(|p| p.ssid.clone()).filter(|s| !s.is_empty()).collect();

    Ok(IgnoreLists { macs: macs.into_iter().collect(), ssids: ssids.into_iter().collect() })
}

/// Load a MAC ignore list. A missing file is an empty list.
pub fn load_mac_list(path: &Path) -> anyhow::Result<Vec<MacAddress>> {
    let Some(entries) = read_entries(path, MAC_LIST_VAR)? else {
        warn!(path = %path.display(), "mac_ignore_list_not_found");
        return Ok(Vec::new());
    };
    let macs = validate_entries(entries, |raw| MacAddress::parse(raw).map_err(|e| e.to_string()));
    info!(path = %path.display(), count = %macs.len(), "mac_ignore_list_loaded");
    Ok(macs)
}

/// Load an SSID ignore list. A missing file is an empty list.
pub fn load_ssid_list(path: &Path) -> anyhow::Result<Vec<Ssid>> {
    let Some(entries) = read_entries(path, SSID_LIST_VAR)? else {
        warn!(path = %path.display(), "ssid_ignore_list_not_found");
        return Ok(Vec::new());
    };
    let ssids = validate_entries(entries, |raw| Ssid::parse(raw).map_err(|e| e.to_string()));
    info!(path = %path.display(), count = %ssids.len(), "ssid_ignore_list_loaded");
    Ok(ssids)
}

pub fn save_mac_list(macs: &[MacAddress], path: &Path) -> anyhow::Result<usize> {
    write_list(macs.iter().map(MacAddress::as_str), path)
}

/// Empty SSIDs carry no signal and are not written
pub fn save_ssid_list(ssids: &[Ssid], path: &Path) -> anyhow::Result<usize> {
    write_list(ssids.iter().filter(|s| !s.is_empty()).map(Ssid::as_str), path)
}

fn write_list<'a>(entries: impl Iterator<Item = &'a str>, path: &Path) -> anyhow::Result<usize> {
    let entries: Vec<&str> = entries.collect();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(path, json + "\n").with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), count = %entries.len(), "ignore_list_saved");
    Ok(entries.len())
}

fn validate_entries<T>(entries: Vec<Value>, parse: impl Fn(&str) -> Result<T, String>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(raw) => match parse(&raw) {
                Ok(value) => Some(value),
                Err(reason) => {
                    warn!(entry = %raw, reason = %reason, "ignore_entry_skipped");
                    None
                }
            },
            other => {
                warn!(entry = %other, reason = "not a string", "ignore_entry_skipped");
                None
            }
        })
        .collect()
}

/// Raw entries from an ignore-list file, `None` if the file does not exist
fn read_entries(path: &Path, variable: &str) -> anyhow::Result<Option<Vec<Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ignore list {}", path.display()))?;
    let content = content.trim();

    if content.starts_with('[') && content.ends_with(']') {
        if let Ok(entries) = serde_json::from_str::<Vec<Value>>(content) {
            return Ok(Some(entries));
        }
    }

    parse_assignment(content, variable)
        .map(Some)
        .with_context(|| format!("Failed to parse ignore list {}", path.display()))
}

/// Parse `<variable> = [...]` with single or double quoted strings
fn parse_assignment(content: &str, variable: &str) -> anyhow::Result<Vec<Value>> {
    let cleaned: Vec<&str> = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .collect();
    let cleaned = cleaned.join(" ");

    let pattern = Regex::new(&format!(r"(?s){}\s*=\s*(\[.*?\])", regex::escape(variable)))?;
    let list = pattern
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| anyhow!("no `{variable} = [...]` assignment found"))?;

    let json = list.as_str().replace('\'', "\"");
    serde_json::from_str(&json).context("assignment is not a list of strings")
}
