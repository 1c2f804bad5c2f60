use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::location::ReverseGeocoder;
use crate::models::Coordinates;

pub const DEFAULT_REVERSE_GEOCODE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Reverse geocoding against a Nominatim compatible endpoint
#[derive(Clone)]
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    endpoint: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: endpoint.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    fn fetch(&self, position: Coordinates) -> Result<Option<String>> {
        let mut response = self
            .agent
            .get(self.endpoint.as_str())
            .header("User-Agent", self.user_agent.as_str())
            .query("format", "json")
            .query("lat", position.latitude.to_string())
            .query("lon", position.longitude.to_string())
            .call()
            .with_context(|| format!("reverse geocoding request to {} failed", self.endpoint))?;

        let body = response
            .body_mut()
            .read_to_string()
            .context("failed to read reverse geocoding response")?;

        parse_reverse_response(&body)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, position: Coordinates) -> Result<Option<String>> {
        let geocoder = self.clone();
        tokio::task::spawn_blocking(move || geocoder.fetch(position))
            .await
            .context("reverse geocoding task panicked")?
    }
}

/// Extracts `display_name`; blank names count as missing
pub fn parse_reverse_response(body: &str) -> Result<Option<String>> {
    let response: ReverseResponse =
        serde_json::from_str(body).context("malformed reverse geocoding response")?;

    Ok(response
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty()))
}
