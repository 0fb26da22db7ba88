// SPDX-License-Identifier: Apache-2.0

use crate::clock::Clock;
use crate::store::{content_doc_id, DocPath, DocumentStore, WriteOp};
use crate::upstream::{AuthUser, CompletionClient, CompletionRequest, NewsProvider, UpstreamError};
use agripulse_api::{AdviceRequest, FragilityRequest};
use agripulse_model::{
    AdviceOutcome, CropAdvice, FragilityAdvisory, FragilityOutcome, FragilitySection,
    WeatherSummary,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Low temperature favors deterministic, instruction-following output.
const COMPLETION_TEMPERATURE: f64 = 0.2;
const ADVICE_MAX_TOKENS: u32 = 600;
const FRAGILITY_MAX_TOKENS: u32 = 700;
const NEWS_MAX_ITEMS: usize = 5;

/// Formats farm state into completion prompts, parses the model's output
/// defensively, and keeps a best-effort per-farmer history.
pub struct AdvisoryService {
    completion: Arc<dyn CompletionClient>,
    news: Option<Arc<dyn NewsProvider>>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl AdvisoryService {
    #[must_use]
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        news: Option<Arc<dyn NewsProvider>>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            completion,
            news,
            store,
            clock,
        }
    }

    pub async fn crop_advice(
        &self,
        request: &AdviceRequest,
        farmer: Option<&AuthUser>,
    ) -> Result<AdviceOutcome, UpstreamError> {
        let crops = request.crops.clone().unwrap_or_default();
        let prompt = advice_prompt(request, &crops);
        let raw = self
            .completion
            .complete(CompletionRequest {
                prompt,
                temperature: COMPLETION_TEMPERATURE,
                max_tokens: ADVICE_MAX_TOKENS,
            })
            .await?;

        let outcome = match parse::extract_json(&raw) {
            Some(value) if value.get("items").is_some_and(Value::is_array) => {
                match serde_json::from_value::<CropAdvice>(value) {
                    Ok(advice) => AdviceOutcome::Structured(advice),
                    Err(_) => AdviceOutcome::Unstructured { advice: raw },
                }
            }
            _ => AdviceOutcome::Unstructured { advice: raw },
        };

        if let Some(farmer) = farmer {
            let text = flatten_advice(&outcome);
            let fields = json!({
                "advice": text,
                "crops": crops,
                "weather": request.weather.clone().unwrap_or(Value::Null),
                "createdAt": self.clock.now().to_rfc3339(),
            });
            self.persist(&farmer.uid, "advisories", &text, fields).await;
        }
        Ok(outcome)
    }

    pub async fn fragility(
        &self,
        request: &FragilityRequest,
        farmer: Option<&AuthUser>,
    ) -> Result<FragilityOutcome, UpstreamError> {
        let query = request
            .lga
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| request.state.clone().filter(|s| !s.is_empty()));
        let news_summary = self.news_summary(query.as_deref()).await;
        let prompt = fragility_prompt(request, &news_summary);
        let raw = self
            .completion
            .complete(CompletionRequest {
                prompt,
                temperature: COMPLETION_TEMPERATURE,
                max_tokens: FRAGILITY_MAX_TOKENS,
            })
            .await?;

        let outcome = match parse::extract_json(&raw) {
            Some(value) if value.get("sections").is_some_and(Value::is_array) => {
                let header = value
                    .get("header")
                    .and_then(Value::as_str)
                    .unwrap_or("Fragility advisory")
                    .to_string();
                match serde_json::from_value::<Vec<FragilitySection>>(value["sections"].clone()) {
                    Ok(sections) => {
                        FragilityOutcome::Structured(FragilityAdvisory { header, sections })
                    }
                    Err(_) => FragilityOutcome::Unstructured { advisory: raw },
                }
            }
            _ => FragilityOutcome::Unstructured { advisory: raw },
        };

        if let Some(farmer) = farmer {
            let fields = match &outcome {
                FragilityOutcome::Structured(advisory) => json!({
                    "header": advisory.header,
                    "sections": advisory.sections,
                    "createdAt": self.clock.now().to_rfc3339(),
                }),
                FragilityOutcome::Unstructured { advisory } => json!({
                    "header": "Fragility advisory",
                    "advisory": advisory,
                    "createdAt": self.clock.now().to_rfc3339(),
                }),
            };
            let keyed = fields.to_string();
            self.persist(&farmer.uid, "fragility", &keyed, fields).await;
        }
        Ok(outcome)
    }

    async fn news_summary(&self, query: Option<&str>) -> String {
        const NONE: &str = "No recent local news found.";
        let (Some(news), Some(query)) = (&self.news, query) else {
            return NONE.to_string();
        };
        match news.recent(query, NEWS_MAX_ITEMS, self.clock.now()).await {
            Ok(items) if !items.is_empty() => items
                .iter()
                .map(agripulse_model::NewsItem::prompt_line)
                .collect::<Vec<_>>()
                .join("\n"),
            Ok(_) => NONE.to_string(),
            Err(err) => {
                warn!("news fetch failed: {err}");
                NONE.to_string()
            }
        }
    }

    /// History writes never fail the request; the advisory already exists
    /// and belongs to the caller regardless.
    async fn persist(&self, uid: &str, collection: &str, content: &str, fields: Value) {
        let stamp = self.clock.now().to_rfc3339();
        let id = content_doc_id(&[uid, collection, content, &stamp]);
        let path = match DocPath::new(["farmers", uid, collection, id.as_str()]) {
            Ok(path) => path,
            Err(err) => {
                warn!("history path invalid for {uid}: {err}");
                return;
            }
        };
        if let Err(err) = self.store.apply(WriteOp::Set { path, fields }).await {
            warn!("history write failed for {uid}: {err}");
        }
    }
}

fn advice_prompt(request: &AdviceRequest, crops: &[String]) -> String {
    let lang = request.lang.as_deref().unwrap_or("English");
    let weather = request
        .weather
        .as_ref()
        .map(WeatherSummary::from_provider_payload)
        .unwrap_or_default();
    let temp = weather
        .temp_c
        .map_or_else(|| "unknown".to_string(), |t| format!("{t}"));
    let cond = weather.condition.as_deref().unwrap_or("clear skies");

    let mut stages = String::new();
    if let Some(crop_stages) = &request.crop_stages {
        for (crop, stage) in crop_stages {
            stages.push_str(&format!("- {crop}: {stage}\n"));
        }
    }
    if stages.is_empty() {
        stages = format!("- all crops: {}\n", request.stage.as_deref().unwrap_or("unknown"));
    }

    format!(
        "You are an expert agricultural AI assistant for smallholder farmers.\n\
         Generate practical, localized farming advice in {lang}.\n\
         Crop(s): {}.\n\
         Current weather: {temp} degrees C, {cond}.\n\
         Crop stages:\n{stages}\
         Respond with ONLY a JSON object of this exact shape (no extra text):\n\
         {{ \"header\": string, \"items\": [ {{ \"crop\": string, \"advice\": string }} ] }}\n\
         Provide one item per crop with short, actionable advice specific to \
         that crop and its growth stage.",
        crops.join(", ")
    )
}

fn fragility_prompt(request: &FragilityRequest, news_summary: &str) -> String {
    let lang = request.lang.as_deref().unwrap_or("English");
    let lga = request.lga.as_deref().unwrap_or("unknown");
    format!(
        "You are an expert risk and fragility analyst for farming communities. \
         Produce ONLY a JSON object (no extra text) with this exact shape:\n\n\
         {{\n  \"header\": string,\n  \"sections\": [ {{ \"title\": string, \
         \"summary\": string, \"severity\": \"low\"|\"moderate\"|\"high\" }} ]\n}}\n\n\
         Requirements:\n\
         - Provide brief updates under these sub-headings: Flood/Drought Risk, \
         Conflict/Displacement, Infrastructure or Market Access Risks, Health \
         or Disease Outbreaks.\n\
         - For each section, summarize relevant institutional alerts, verified \
         local news (last 48 hours), or other authoritative sources. If no data \
         available, say 'No recent reports'.\n\
         - Add a severity field with values: low, moderate, or high.\n\
         - Include short source tags where local news or alerts are referenced \
         (e.g., 'Source: <name>').\n\
         - Translate summaries into {lang}.\n\n\
         Data:\n- Location (LGA): {lga}\n\n\
         Recent local news (last 48h):\n{news_summary}\n\n\
         Return only valid JSON matching the shape above."
    )
}

fn flatten_advice(outcome: &AdviceOutcome) -> String {
    match outcome {
        AdviceOutcome::Structured(advice) => {
            let joined = advice
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}. {}\n{}", i + 1, item.crop, item.advice))
                .collect::<Vec<_>>()
                .join("\n\n");
            match &advice.header {
                Some(header) => format!("{header}\n\n{joined}"),
                None => joined,
            }
        }
        AdviceOutcome::Unstructured { advice } => advice.clone(),
    }
}

pub(crate) mod parse {
    use serde_json::Value;

    /// Best-effort extraction of the JSON object a prompt demanded.
    ///
    /// Models regularly wrap the object in prose or code fences; the first
    /// fallback takes the largest block from the first `{` to the last `}`.
    /// Anything that still does not parse is the caller's unstructured
    /// fallback; this never errors.
    pub(crate) fn extract_json(text: &str) -> Option<Value> {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            if value.is_object() {
                return Some(value);
            }
        }
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Value>(&text[start..=end])
            .ok()
            .filter(Value::is_object)
    }

}
