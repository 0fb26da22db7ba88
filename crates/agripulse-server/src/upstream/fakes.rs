// SPDX-License-Identifier: Apache-2.0

use super::{
    AuthUser, CompletionClient, CompletionRequest, GatewayVerification, IdentityProvider,
    InitializedTransaction, NewsProvider, PaymentGateway, UpstreamError, WeatherProvider,
};
use agripulse_model::{NewsItem, Plan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Gateway fake: verifications are seeded by reference; initialize hands
/// back a canned checkout URL.
#[derive(Default)]
pub struct FakeGateway {
    pub verifications: Mutex<HashMap<String, GatewayVerification>>,
    pub fail: AtomicBool,
}

impl FakeGateway {
    pub async fn seed_verification(&self, verification: GatewayVerification) {
        self.verifications
            .lock()
            .await
            .insert(verification.reference.clone(), verification);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(
        &self,
        email: &str,
        amount_minor: u64,
        _callback_url: &str,
        plan: Plan,
    ) -> Result<InitializedTransaction, UpstreamError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(UpstreamError("gateway down".to_string()));
        }
        let reference = format!("ref-{}-{}", plan.as_str(), amount_minor);
        let _ = email;
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.invalid/{reference}"),
            access_code: None,
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification, UpstreamError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(UpstreamError("gateway down".to_string()));
        }
        self.verifications
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| UpstreamError(format!("unknown reference {reference}")))
    }
}

/// Identity fake: tokens and email mappings are registered up front.
#[derive(Default)]
pub struct FakeIdentity {
    pub tokens: Mutex<HashMap<String, AuthUser>>,
    pub uid_by_email: Mutex<HashMap<String, String>>,
    pub users: Mutex<HashSet<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_email_lookup: AtomicBool,
}

impl FakeIdentity {
    pub async fn register(&self, token: &str, uid: &str, email: Option<&str>) {
        self.tokens.lock().await.insert(
            token.to_string(),
            AuthUser {
                uid: uid.to_string(),
                email: email.map(str::to_string),
            },
        );
        if let Some(email) = email {
            self.uid_by_email
                .lock()
                .await
                .insert(email.to_string(), uid.to_string());
        }
        self.users.lock().await.insert(uid.to_string());
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn verify_token(&self, id_token: &str) -> Result<AuthUser, UpstreamError> {
        self.tokens
            .lock()
            .await
            .get(id_token)
            .cloned()
            .ok_or_else(|| UpstreamError("invalid token".to_string()))
    }

    async fn lookup_uid_by_email(&self, email: &str) -> Result<Option<String>, UpstreamError> {
        if self.fail_email_lookup.load(Ordering::Relaxed) {
            return Err(UpstreamError("lookup down".to_string()));
        }
        Ok(self.uid_by_email.lock().await.get(email).cloned())
    }

    async fn delete_user(&self, uid: &str) -> Result<bool, UpstreamError> {
        let existed = self.users.lock().await.remove(uid);
        self.deleted.lock().await.push(uid.to_string());
        Ok(existed)
    }
}

/// Completion fake: returns a canned response and records the last prompt.
pub struct FakeCompletion {
    pub response: Mutex<String>,
    pub last_prompt: Mutex<Option<String>>,
    pub fail: AtomicBool,
}

impl Default for FakeCompletion {
    fn default() -> Self {
        Self {
            response: Mutex::new("{}".to_string()),
            last_prompt: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }
}

impl FakeCompletion {
    pub async fn set_response(&self, text: &str) {
        *self.response.lock().await = text.to_string();
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(UpstreamError("model down".to_string()));
        }
        *self.last_prompt.lock().await = Some(request.prompt);
        Ok(self.response.lock().await.clone())
    }
}

/// Weather fake with a settable payload.
pub struct FakeWeather {
    pub payload: Mutex<Value>,
    pub fail: AtomicBool,
}

impl Default for FakeWeather {
    fn default() -> Self {
        Self {
            payload: Mutex::new(json!({
                "main": { "temp": 30.0, "humidity": 60 },
                "weather": [{ "description": "clear sky" }],
            })),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn current(&self, _lat: f64, _lon: f64) -> Result<Value, UpstreamError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(UpstreamError("weather down".to_string()));
        }
        Ok(self.payload.lock().await.clone())
    }
}

#[derive(Default)]
pub struct FakeNews {
    pub items: Mutex<Vec<NewsItem>>,
}

#[async_trait]
impl NewsProvider for FakeNews {
    async fn recent(
        &self,
        _query: &str,
        max_items: usize,
        _now: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, UpstreamError> {
        let items = self.items.lock().await;
        Ok(items.iter().take(max_items).cloned().collect())
    }
}
