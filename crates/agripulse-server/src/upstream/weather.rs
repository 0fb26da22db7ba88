// SPDX-License-Identifier: Apache-2.0

use super::UpstreamError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait WeatherProvider: Send + Sync + 'static {
    /// Current conditions at a coordinate. The raw payload is relayed to
    /// clients unchanged, so the port stays untyped.
    async fn current(&self, lat: f64, lon: f64) -> Result<Value, UpstreamError>;
}

pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, lat: f64, lon: f64) -> Result<Value, UpstreamError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError(format!("weather fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(UpstreamError(format!(
                "weather provider returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("weather parse failed: {e}")))
    }
}
