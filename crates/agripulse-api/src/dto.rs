// SPDX-License-Identifier: Apache-2.0

use agripulse_model::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// POST /api/access-code — check without consuming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeCheckRequest {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheckResponse {
    pub valid: bool,
    pub uses: u64,
    pub max_uses: u64,
}

/// POST /api/access-code/consume and /consume-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeConsumeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeConsumeResponse {
    pub success: bool,
    pub uses: u64,
    pub max_uses: u64,
}

/// POST /api/advice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
    pub crops: Option<Vec<String>>,
    pub weather: Option<Value>,
    pub lang: Option<String>,
    /// Per-crop growth stage, keyed by crop id.
    pub crop_stages: Option<BTreeMap<String, String>>,
    /// Single-stage shorthand kept for older clients.
    pub stage: Option<String>,
}

/// POST /api/fragility.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FragilityRequest {
    pub lang: Option<String>,
    pub lga: Option<String>,
    pub state: Option<String>,
}

/// POST /api/weather.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// POST /api/paystack — initialize a transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeRequest {
    pub email: Option<String>,
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub authorization_url: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
}

/// POST /api/paystack/verify.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyRequest {
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub paid_at: DateTime<Utc>,
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_uid: Option<String>,
    pub prorate_discount: u64,
    pub final_charge: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub data: VerifyData,
}

/// GET /api/paystack/config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPackage {
    pub id: String,
    pub label: String,
    pub amount_major: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfigResponse {
    pub success: bool,
    pub public_key: Option<String>,
    pub packages: BTreeMap<String, ConfigPackage>,
}

/// POST /api/admin/delete-farmer and /delete-farmer-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteFarmerRequest {
    pub uid: Option<String>,
}

/// Per-step outcome of the rollback saga. Both steps are best-effort and
/// reported individually so an operator can finish a partial cleanup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackDetails {
    pub auth_deleted: bool,
    pub doc_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFarmerResponse {
    pub success: bool,
    pub details: RollbackDetails,
}
