// SPDX-License-Identifier: Apache-2.0

use agripulse_ledger::DEFAULT_MAX_USES;
use agripulse_model::PlanPrices;
use serde::Serialize;
use std::time::Duration;

/// Runtime configuration carried into the router state. Populated from the
/// environment in `main`; defaults keep a dev instance runnable with no
/// configuration at all (admin routes stay locked until a secret is set).
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
    /// Shared secret for the server-to-server routes. `None` keeps those
    /// routes permanently 401.
    #[serde(skip_serializing)]
    pub admin_secret: Option<String>,
    /// The promotional code value this deployment honors.
    pub access_code: String,
    /// Cap written when seeding a fresh code document.
    pub access_code_max_uses: u64,
    /// Publishable gateway key exposed by the public config route.
    pub paystack_public_key: Option<String>,
    pub prices: PlanPrices,
    /// Base URL used to build the payment callback.
    pub public_app_url: String,
    /// Origins allowed to call the payment verify route.
    pub cors_allowed_origins: Vec<String>,
    pub shutdown_drain: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 16 * 1024,
            admin_secret: None,
            access_code: "HARVEST-GATE".to_string(),
            access_code_max_uses: DEFAULT_MAX_USES,
            paystack_public_key: None,
            prices: PlanPrices::default(),
            public_app_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            shutdown_drain: Duration::from_millis(5000),
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if api.access_code.trim().is_empty() {
        return Err("access code must not be empty".to_string());
    }
    if api.access_code_max_uses == 0 {
        return Err("access code max uses must be > 0".to_string());
    }
    if api
        .admin_secret
        .as_deref()
        .is_some_and(|s| s.trim().is_empty())
    {
        return Err("admin secret must not be empty when set".to_string());
    }
    if api.public_app_url.trim().is_empty() {
        return Err("public app url must not be empty".to_string());
    }
    if api.cors_allowed_origins.iter().any(|o| o.trim().is_empty()) {
        return Err("cors allow-list must not contain empty origins".to_string());
    }
    Ok(())
}
