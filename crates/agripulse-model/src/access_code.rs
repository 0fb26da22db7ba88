// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Counter state of a promotional access code document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeState {
    pub uses: u64,
    pub max_uses: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

impl AccessCodeState {
    /// Reads the counters out of a raw document. An absent document is a
    /// code that has never been redeemed; `default_max_uses` fills the cap
    /// until an operator writes one.
    #[must_use]
    pub fn from_document(doc: Option<&Value>, default_max_uses: u64) -> Self {
        let uses = doc
            .and_then(|d| d.get("uses"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let max_uses = doc
            .and_then(|d| d.get("maxUses"))
            .and_then(Value::as_u64)
            .unwrap_or(default_max_uses);
        let last_used = doc
            .and_then(|d| d.get("lastUsed"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Self {
            uses,
            max_uses,
            last_used,
        }
    }

    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.uses >= self.max_uses
    }
}

/// Per-consumer audit record written alongside a successful redemption,
/// keyed by the consumer's uid. Audit only; the cap lives on the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeUseRecord {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub used_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_document_reads_as_fresh_code() {
        let state = AccessCodeState::from_document(None, 50);
        assert_eq!(state.uses, 0);
        assert_eq!(state.max_uses, 50);
        assert!(!state.exhausted());
    }

    #[test]
    fn exhaustion_is_inclusive_of_the_cap() {
        let doc = json!({ "uses": 50, "maxUses": 50 });
        assert!(AccessCodeState::from_document(Some(&doc), 50).exhausted());
        let doc = json!({ "uses": 49, "maxUses": 50 });
        assert!(!AccessCodeState::from_document(Some(&doc), 50).exhausted());
    }
}
