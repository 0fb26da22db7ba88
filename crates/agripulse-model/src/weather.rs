// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Condensed current-conditions reading used when formatting advisory
/// prompts. The raw provider payload is relayed to clients untouched; only
/// the prompt builder needs this digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub temp_c: Option<f64>,
    pub humidity: Option<f64>,
    pub condition: Option<String>,
}

impl WeatherSummary {
    /// Accepts both provider payload shapes seen in the wild: the
    /// current-weather shape (`main.temp` / `weather[0].description`) and
    /// the one-call shape (`current.temp` / `current.weather[0].description`).
    #[must_use]
    pub fn from_provider_payload(payload: &Value) -> Self {
        let current = payload.get("current");
        let temp_c = payload
            .get("main")
            .and_then(|m| m.get("temp"))
            .or_else(|| current.and_then(|c| c.get("temp")))
            .and_then(Value::as_f64);
        let humidity = payload
            .get("main")
            .and_then(|m| m.get("humidity"))
            .or_else(|| current.and_then(|c| c.get("humidity")))
            .and_then(Value::as_f64);
        let condition = payload
            .get("weather")
            .or_else(|| current.and_then(|c| c.get("weather")))
            .and_then(|w| w.get(0))
            .and_then(|w| w.get("description"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            temp_c,
            humidity,
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_current_weather_shape() {
        let payload = json!({
            "main": { "temp": 31.2, "humidity": 64 },
            "weather": [{ "description": "scattered clouds" }],
        });
        let s = WeatherSummary::from_provider_payload(&payload);
        assert_eq!(s.temp_c, Some(31.2));
        assert_eq!(s.humidity, Some(64.0));
        assert_eq!(s.condition.as_deref(), Some("scattered clouds"));
    }

    #[test]
    fn reads_one_call_shape() {
        let payload = json!({
            "current": { "temp": 28.0, "weather": [{ "description": "light rain" }] },
        });
        let s = WeatherSummary::from_provider_payload(&payload);
        assert_eq!(s.temp_c, Some(28.0));
        assert_eq!(s.condition.as_deref(), Some("light rain"));
    }

    #[test]
    fn empty_payload_reads_as_unknown() {
        let s = WeatherSummary::from_provider_payload(&json!({}));
        assert_eq!(s, WeatherSummary::default());
    }
}
