// SPDX-License-Identifier: Apache-2.0

use crate::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subscription-relevant slice of a farmer document.
///
/// Farmer documents accumulate unrelated fields (crops, language, location);
/// this view extracts only what the ledger needs and tolerates missing or
/// malformed values the way the stored data actually looks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionView {
    pub plan: Option<Plan>,
    pub paid_access: bool,
    pub access_code_used: bool,
    pub payment_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub next_payment_date: Option<DateTime<Utc>>,
}

fn read_bool(doc: &Value, field: &str) -> bool {
    doc.get(field).and_then(Value::as_bool) == Some(true)
}

fn read_timestamp(doc: &Value, field: &str) -> Option<DateTime<Utc>> {
    doc.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl SubscriptionView {
    /// Field-by-field extraction from a raw document. A bad or missing field
    /// degrades to its absent form; it never fails the read.
    #[must_use]
    pub fn from_document(doc: &Value) -> Self {
        Self {
            plan: Plan::parse_lenient(doc.get("plan").and_then(Value::as_str)),
            paid_access: read_bool(doc, "paidAccess"),
            access_code_used: read_bool(doc, "accessCodeUsed"),
            payment_reference: doc
                .get("paymentReference")
                .and_then(Value::as_str)
                .map(str::to_string),
            payment_date: read_timestamp(doc, "paymentDate"),
            next_payment_date: read_timestamp(doc, "nextPaymentDate"),
        }
    }

    /// Expiry used for the active check. Legacy documents recorded only
    /// `paymentDate`, so that is the fallback when `nextPaymentDate` is
    /// missing.
    #[must_use]
    pub fn effective_expiry(&self) -> Option<DateTime<Utc>> {
        self.next_payment_date.or(self.payment_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_subscription_fields_and_ignores_the_rest() {
        let doc = json!({
            "name": "Amina",
            "crops": ["maize", "cassava"],
            "plan": "monthly",
            "paidAccess": true,
            "accessCodeUsed": false,
            "paymentReference": "ref_123",
            "paymentDate": "2025-03-01T00:00:00Z",
            "nextPaymentDate": "2025-04-01T00:00:00Z",
        });
        let view = SubscriptionView::from_document(&doc);
        assert_eq!(view.plan, Some(Plan::Monthly));
        assert!(view.paid_access);
        assert!(!view.access_code_used);
        assert_eq!(view.payment_reference.as_deref(), Some("ref_123"));
        assert_eq!(
            view.next_payment_date.unwrap().to_rfc3339(),
            "2025-04-01T00:00:00+00:00"
        );
    }

    #[test]
    fn malformed_fields_degrade_to_absent() {
        let doc = json!({
            "plan": "lifetime",
            "paidAccess": "yes",
            "nextPaymentDate": "not a date",
        });
        let view = SubscriptionView::from_document(&doc);
        assert_eq!(view.plan, None);
        assert!(!view.paid_access);
        assert_eq!(view.next_payment_date, None);
    }

    #[test]
    fn expiry_falls_back_to_payment_date() {
        let doc = json!({ "paymentDate": "2025-03-01T00:00:00Z" });
        let view = SubscriptionView::from_document(&doc);
        assert_eq!(
            view.effective_expiry().unwrap().to_rfc3339(),
            "2025-03-01T00:00:00+00:00"
        );
    }
}
