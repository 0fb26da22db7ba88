// SPDX-License-Identifier: Apache-2.0

use super::UpstreamError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Identity asserted by the auth provider for a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Verifies a client bearer token and returns the identity it asserts.
    async fn verify_token(&self, id_token: &str) -> Result<AuthUser, UpstreamError>;

    /// Best-effort uid lookup for a payment customer email. `Ok(None)`
    /// means the provider has no account for that address.
    async fn lookup_uid_by_email(&self, email: &str) -> Result<Option<String>, UpstreamError>;

    /// Deletes the auth account. `Ok(false)` means there was nothing to
    /// delete, which the rollback saga treats as already done.
    async fn delete_user(&self, uid: &str) -> Result<bool, UpstreamError>;
}

/// REST adapter for an Identity-Toolkit-style account API
/// (`accounts:lookup` / `accounts:delete` under one base URL, authorized
/// with a server key).
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl HttpIdentityProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: String, server_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            server_key,
        }
    }

    async fn post(&self, op: &str, body: Value) -> Result<Value, UpstreamError> {
        let url = format!("{}/{op}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.server_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError(format!("identity {op} failed: {e}")))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError(format!("identity {op} parse failed: {e}")))?;
        if !status.is_success() {
            return Err(UpstreamError(format!(
                "identity {op} returned {status}: {}",
                payload
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            )));
        }
        Ok(payload)
    }
}

fn first_user(payload: &Value) -> Option<&Value> {
    payload.get("users").and_then(|u| u.get(0))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_token(&self, id_token: &str) -> Result<AuthUser, UpstreamError> {
        let payload = self
            .post("accounts:lookup", json!({ "idToken": id_token }))
            .await?;
        let user = first_user(&payload)
            .ok_or_else(|| UpstreamError("identity token verified no account".to_string()))?;
        let uid = user
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError("identity account missing localId".to_string()))?
            .to_string();
        Ok(AuthUser {
            uid,
            email: user
                .get("email")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn lookup_uid_by_email(&self, email: &str) -> Result<Option<String>, UpstreamError> {
        let payload = self
            .post("accounts:lookup", json!({ "email": [email] }))
            .await?;
        Ok(first_user(&payload)
            .and_then(|u| u.get("localId"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn delete_user(&self, uid: &str) -> Result<bool, UpstreamError> {
        match self.post("accounts:delete", json!({ "localId": uid })).await {
            Ok(_) => Ok(true),
            Err(UpstreamError(detail)) if detail.contains("USER_NOT_FOUND") => Ok(false),
            Err(err) => Err(err),
        }
    }
}
