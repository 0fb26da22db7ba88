// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A recent local news item used to enrich fragility prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl NewsItem {
    /// Single-line rendering used inside prompts: title, then source and
    /// link when known.
    #[must_use]
    pub fn prompt_line(&self) -> String {
        let mut line = self.title.clone();
        if let Some(source) = &self.source {
            line.push_str(&format!(" (Source: {source})"));
        }
        if let Some(url) = &self.url {
            line.push_str(&format!(" - {url}"));
        }
        line
    }
}
