//! WiGLE network search client
//!
//! Looks up where a probed SSID has been recorded by wardrivers. Requests go
//! to `/api/v2/network/search` with Basic auth; the configured bounding box,
//! when complete, limits results to the local area.
//!
//! Lookups consume API credits, so nothing here runs unless the report is
//! asked for it.

use crate::domain::Ssid;
use crate::infra::{BoundingBox, WigleConfig};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, info};

const SEARCH_PATH: &str = "/api/v2/network/search";

/// Sightings shown per SSID
const SHOWN_LOCATIONS: usize = 3;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("WiGLE API token not configured")]
    NotConfigured,
    #[error("WiGLE request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WiGLE returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable WiGLE response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("WiGLE search refused: {0}")]
    Refused(String),
}

/// One recorded network matching the search
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WigleLocation {
    #[serde(rename = "trilat")]
    pub lat: Option<f64>,
    #[serde(rename = "trilong")]
    pub lon: Option<f64>,
    #[serde(rename = "lastupdt")]
    pub last_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    total_results: Option<u64>,
    #[serde(default)]
    results: Vec<WigleLocation>,
}

/// Search result for one SSID
#[derive(Debug, Clone, PartialEq)]
pub struct WigleSummary {
    pub total_results: u64,
    /// Most recent first, as returned by the API
    pub locations: Vec<WigleLocation>,
}

impl WigleSummary {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Known locations: {}", self.total_results);
        if !self.locations.is_empty() {
            out.push_str("Recent sightings:\n");
        }
        for location in self.locations.iter().take(SHOWN_LOCATIONS) {
            let coord = |v: Option<f64>| v.map_or_else(|| "?".to_string(), |v| format!("{v:.6}"));
            let _ = writeln!(out, "- Lat: {}, Lon: {}", coord(location.lat), coord(location.lon));
            let _ = writeln!(out, "  Last seen: {}", location.last_update.as_deref().unwrap_or("?"));
        }
        out
    }
}

/// Value of the `Authorization` header.
///
/// With an API name the pair is encoded; without one the token is taken to
/// be the encoded credential already.
pub fn auth_header(api_name: &str, api_token: &str) -> String {
    if api_name.is_empty() {
        format!("Basic {}", api_token)
    } else {
        let credentials = format!("{}:{}", api_name, api_token);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }
}

/// Query parameters for one SSID search
pub fn search_params(ssid: &Ssid, area: Option<BoundingBox>) -> Vec<(&'static str, String)> {
    let mut params = vec![("ssid", ssid.as_str().to_string())];
    if let Some(area) = area {
        params.push(("latrange1", area.lat_min.to_string()));
        params.push(("latrange2", area.lat_max.to_string()));
        params.push(("longrange1", area.lon_min.to_string()));
        params.push(("longrange2", area.lon_max.to_string()));
    }
    params
}

/// Decode a search response body
pub fn parse_search_response(body: &str) -> Result<WigleSummary, LookupError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    if !response.success {
        return Err(LookupError::Refused(response.message.unwrap_or_else(|| "no reason given".to_string())));
    }
    let total_results = response.total_results.unwrap_or(response.results.len() as u64);
    Ok(WigleSummary { total_results, locations: response.results })
}

pub struct WigleClient {
    http: reqwest::Client,
    search_url: String,
    auth: String,
    area: Option<BoundingBox>,
}

impl WigleClient {
    pub fn new(config: &WigleConfig) -> Result<Self, LookupError> {
        if !config.has_credentials() {
            return Err(LookupError::NotConfigured);
        }

        // One client for every lookup in the run (connection pooling)
        let http = reqwest::Client::builder().timeout(config.timeout()).http1_only().build()?;
        let area = config.bounding_box();
        if area.is_some() {
            info!("wigle_local_search_area");
        }

        Ok(Self {
            http,
            search_url: format!("{}{}", config.base_url.trim_end_matches('/'), SEARCH_PATH),
            auth: auth_header(&config.api_name, &config.api_token),
            area,
        })
    }

    pub async fn search(&self, ssid: &Ssid) -> Result<WigleSummary, LookupError> {
        debug!(ssid = %ssid, "wigle_search");
        let response = self
            .http
            .get(&self.search_url)
            .query(&search_params(ssid, self.area))
            .header("Accept", "application/json")
            .header("Authorization", &self.auth)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LookupError::Status { status: status.as_u16(), body });
        }
        parse_search_response(&body)
    }
}
