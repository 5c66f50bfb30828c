/// Field gateway HTTP client.
///
/// The gateway buffers messages from field units and serves them per site:
///
/// ```text
/// GET {base_url}/api/sensors/{site_id}/readings?since=2025-01-15T10:30:00Z
/// ```
///
/// The response is a JSON array of readings, oldest first. `GATEWAY_URL`
/// (environment or `.env`) overrides the configured base URL.

use chrono::{DateTime, SecondsFormat, Utc};
use std::env;
use std::time::Duration;

use super::message;
use crate::config::GatewayConfig;
use crate::model::{FloodError, RawReading};

pub struct GatewayClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FloodError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FloodError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, FloodError> {
        dotenv::dotenv().ok();
        let base_url = env::var("GATEWAY_URL").unwrap_or_else(|_| config.base_url.clone());
        Self::new(&base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL for readings of `site_id` newer than `since`.
    pub fn readings_url(&self, site_id: &str, since: Option<DateTime<Utc>>) -> String {
        let mut url = format!("{}/api/sensors/{}/readings", self.base_url, site_id);
        if let Some(since) = since {
            url.push_str("?since=");
            url.push_str(&since.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        url
    }

    /// Readings the gateway holds for a site after `since`.
    pub fn fetch_pending(
        &self,
        site_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawReading>, FloodError> {
        let url = self.readings_url(site_id, since);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FloodError::Transport(format!("GET {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(FloodError::Transport(format!(
                "gateway returned {} for {}",
                response.status(),
                site_id
            )));
        }

        let body = response
            .text()
            .map_err(|e| FloodError::Transport(format!("reading body for {}: {}", site_id, e)))?;
        message::decode_batch(&body)
    }
}
