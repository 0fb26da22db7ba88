// SPDX-License-Identifier: Apache-2.0

use super::UpstreamError;
use agripulse_model::NewsItem;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

/// Recency window for fragility prompt enrichment.
const RECENCY_HOURS: i64 = 48;

#[async_trait]
pub trait NewsProvider: Send + Sync + 'static {
    /// Recent items for a location query, already recency-filtered. An
    /// empty vec means nothing recent; errors degrade at the caller.
    async fn recent(
        &self,
        query: &str,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, UpstreamError>;
}

/// SerpAPI Google News adapter.
pub struct SerpNewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SerpNewsClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// Provider dates look like `11/12/2024, 09:03 AM, +0200 EET`; only the
/// leading date part parses reliably, so recency is judged at day
/// granularity. Unparseable or missing dates are kept rather than dropped.
fn within_recency(published_at: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(raw) = published_at else {
        return true;
    };
    let Some(date_part) = raw.split(',').next() else {
        return true;
    };
    let Ok(date) = NaiveDate::parse_from_str(date_part.trim(), "%m/%d/%Y") else {
        return true;
    };
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return true;
    };
    let published = Utc.from_utc_datetime(&midnight);
    (now - published).num_hours() < RECENCY_HOURS
}

fn item_from_result(result: &Value) -> Option<NewsItem> {
    let title = result.get("title").and_then(Value::as_str)?.to_string();
    let source = match result.get("source") {
        Some(Value::Object(map)) => map.get("name").and_then(Value::as_str).map(str::to_string),
        Some(Value::String(name)) => Some(name.clone()),
        _ => None,
    };
    Some(NewsItem {
        title,
        url: result
            .get("link")
            .and_then(Value::as_str)
            .map(str::to_string),
        source,
        published_at: result
            .get("date")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl NewsProvider for SerpNewsClient {
    async fn recent(
        &self,
        query: &str,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, UpstreamError> {
        let url = format!("{}/search.json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("gl", "ng"),
                ("hl", "en"),
                ("api_key", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError(format!("news fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(UpstreamError(format!(
                "news provider returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("news parse failed: {e}")))?;
        let Some(results) = body.get("news_results").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        Ok(results
            .iter()
            .filter_map(item_from_result)
            .filter(|item| within_recency(item.published_at.as_deref(), now))
            .take(max_items)
            .collect())
    }
}
