// SPDX-License-Identifier: Apache-2.0

use super::UpstreamError;
use agripulse_model::Plan;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Result of initializing a transaction: where to send the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: Option<String>,
    pub reference: String,
}

/// Result of server-to-server verification of a client-reported reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayVerification {
    /// The gateway's own payment status field equals "success".
    pub succeeded: bool,
    pub reference: String,
    pub amount_minor: u64,
    pub email: Option<String>,
    /// Plan name from the transaction metadata, unvalidated.
    pub plan_raw: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn initialize(
        &self,
        email: &str,
        amount_minor: u64,
        callback_url: &str,
        plan: Plan,
    ) -> Result<InitializedTransaction, UpstreamError>;

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, UpstreamError>;
}

/// Paystack adapter. Only the secret key ever reaches the wire; the
/// publishable key stays client-side via the config route.
pub struct PaystackGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, secret_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize(
        &self,
        email: &str,
        amount_minor: u64,
        callback_url: &str,
        plan: Plan,
    ) -> Result<InitializedTransaction, UpstreamError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "email": email,
                "amount": amount_minor,
                "callback_url": callback_url,
                "metadata": { "plan": plan.as_str() },
            }))
            .send()
            .await
            .map_err(|e| UpstreamError(format!("gateway initialize failed: {e}")))?;
        if !response.status().is_success() {
            return Err(UpstreamError(format!(
                "gateway initialize returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("gateway initialize parse failed: {e}")))?;
        let data = body
            .get("data")
            .ok_or_else(|| UpstreamError("gateway initialize payload missing data".to_string()))?;
        let authorization_url = data
            .get("authorization_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                UpstreamError("gateway initialize payload missing authorization_url".to_string())
            })?
            .to_string();
        let reference = data
            .get("reference")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                UpstreamError("gateway initialize payload missing reference".to_string())
            })?
            .to_string();
        Ok(InitializedTransaction {
            authorization_url,
            access_code: data
                .get("access_code")
                .and_then(Value::as_str)
                .map(str::to_string),
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, UpstreamError> {
        let url = format!("{}/transaction/verify/{reference}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| UpstreamError(format!("gateway verify failed: {e}")))?;
        if !response.status().is_success() {
            return Err(UpstreamError(format!(
                "gateway verify returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("gateway verify parse failed: {e}")))?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        Ok(GatewayVerification {
            succeeded: data.get("status").and_then(Value::as_str) == Some("success"),
            reference: data
                .get("reference")
                .and_then(Value::as_str)
                .unwrap_or(reference)
                .to_string(),
            amount_minor: data.get("amount").and_then(Value::as_u64).unwrap_or(0),
            email: data
                .get("customer")
                .and_then(|c| c.get("email"))
                .and_then(Value::as_str)
                .map(str::to_string),
            plan_raw: data
                .get("metadata")
                .and_then(|m| m.get("plan"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}
