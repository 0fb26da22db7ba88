// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
mod http;
mod middleware;
pub mod services;
pub mod store;
pub mod upstream;

pub const CRATE_NAME: &str = "agripulse-server";

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{validate_startup_config_contract, ApiConfig};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use upstream::{FakeCompletion, FakeGateway, FakeIdentity, FakeNews, FakeWeather};

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use services::{AccessCodeService, AdminService, AdvisoryService, PaymentService};
use std::sync::Arc;
use upstream::{CompletionClient, IdentityProvider, NewsProvider, PaymentGateway, WeatherProvider};

/// Shared handler state: configuration plus the service layer, all
/// initialize-once and cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub weather: Arc<dyn WeatherProvider>,
    pub access_codes: Arc<AccessCodeService>,
    pub payments: Arc<PaymentService>,
    pub advisories: Arc<AdvisoryService>,
    pub admin: Arc<AdminService>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        weather: Arc<dyn WeatherProvider>,
        completion: Arc<dyn CompletionClient>,
        news: Option<Arc<dyn NewsProvider>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let access_codes = Arc::new(AccessCodeService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.access_code.clone(),
            config.access_code_max_uses,
        ));
        let payments = Arc::new(PaymentService::new(
            gateway,
            Arc::clone(&identity),
            Arc::clone(&store),
            Arc::clone(&clock),
            config.prices,
            config.public_app_url.clone(),
        ));
        let advisories = Arc::new(AdvisoryService::new(
            completion,
            news,
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let admin = Arc::new(AdminService::new(Arc::clone(&identity), Arc::clone(&store)));
        Self {
            config: Arc::new(config),
            store,
            identity,
            weather,
            access_codes,
            payments,
            advisories,
            admin,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route(
            "/api/access-code",
            post(http::handlers::access_code_check_handler),
        )
        .route(
            "/api/access-code/consume",
            post(http::handlers::access_code_consume_handler),
        )
        .route(
            "/api/access-code/consume-client",
            post(http::handlers::access_code_consume_client_handler),
        )
        .route(
            "/api/admin/delete-farmer",
            post(http::handlers::delete_farmer_handler),
        )
        .route(
            "/api/admin/delete-farmer-client",
            post(http::handlers::delete_farmer_client_handler),
        )
        .route("/api/advice", post(http::handlers::advice_handler))
        .route("/api/fragility", post(http::handlers::fragility_handler))
        .route("/api/weather", post(http::handlers::weather_handler))
        .route(
            "/api/paystack/config",
            get(http::handlers::paystack_config_handler),
        )
        .route(
            "/api/paystack",
            post(http::handlers::paystack_initialize_handler),
        )
        .route(
            "/api/paystack/verify",
            post(http::handlers::paystack_verify_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::cors::cors_middleware,
        ))
        .layer(from_fn(
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state)
}
