// SPDX-License-Identifier: Apache-2.0

use crate::http::response::{failure, invalid, json_ok};
use crate::middleware::auth::{admin_secret_ok, bearer_user, optional_bearer_user};
use crate::services::{AccessCodeError, PaymentError};
use crate::store::{DocPath, DocumentStore};
use crate::AppState;
use agripulse_api::{
    AdviceRequest, ApiError, ApiErrorCode, CodeCheckRequest, CodeCheckResponse,
    CodeConsumeRequest, CodeConsumeResponse, ConfigPackage, DeleteFarmerRequest,
    DeleteFarmerResponse, FragilityRequest, InitializeRequest, InitializeResponse,
    PaymentConfigResponse, VerifyRequest, VerifyResponse, WeatherRequest,
};
use agripulse_model::Plan;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::error;

fn access_code_error(err: AccessCodeError) -> ApiError {
    match err {
        AccessCodeError::InvalidCode => ApiError::new(ApiErrorCode::InvalidCode, "Invalid code"),
        AccessCodeError::Expired(message) => ApiError::new(ApiErrorCode::CodeExpired, message),
        AccessCodeError::Store(store_err) => {
            error!("access code store failure: {store_err}");
            ApiError::new(ApiErrorCode::StoreFailed, "Server error")
        }
    }
}

fn requested_code(request: Option<String>) -> Result<String, ApiError> {
    request
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::new(ApiErrorCode::InvalidCode, "Invalid code"))
}

pub(crate) async fn healthz_handler() -> Response {
    json_ok(&json!({ "status": "ok" }))
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> Response {
    let probe = match DocPath::new(["health", "probe"]) {
        Ok(path) => state.store.get(&path).await,
        Err(err) => Err(err),
    };
    match probe {
        Ok(_) => json_ok(&json!({ "ready": true, "store": state.store.backend_tag() })),
        Err(err) => {
            error!("readiness store probe failed: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ready": false })),
            )
                .into_response()
        }
    }
}

/// POST /api/access-code: validity check only, never consumes a slot.
pub(crate) async fn access_code_check_handler(
    State(state): State<AppState>,
    body: Result<Json<CodeCheckRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return invalid(&ApiError::invalid_body());
    };
    let code = match requested_code(request.code) {
        Ok(code) => code,
        Err(err) => return invalid(&err),
    };
    match state.access_codes.check(&code).await {
        Ok(status) => json_ok(&CodeCheckResponse {
            valid: true,
            uses: status.uses,
            max_uses: status.max_uses,
        }),
        Err(err) => invalid(&access_code_error(err)),
    }
}

/// POST /api/access-code/consume-client: audited consumption for the
/// authenticated caller.
pub(crate) async fn access_code_consume_client_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CodeConsumeRequest>, JsonRejection>,
) -> Response {
    let user = match bearer_user(&state.identity, &headers).await {
        Ok(user) => user,
        Err(err) => return failure(&err),
    };
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let code = match requested_code(request.code) {
        Ok(code) => code,
        Err(err) => return failure(&err),
    };
    match state.access_codes.consume(&code, Some(&user)).await {
        Ok(status) => json_ok(&CodeConsumeResponse {
            success: true,
            uses: status.uses,
            max_uses: status.max_uses,
        }),
        Err(err) => failure(&access_code_error(err)),
    }
}

/// POST /api/access-code/consume: server-to-server consumption behind the
/// shared admin secret; no consumer identity, so no audit record.
pub(crate) async fn access_code_consume_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CodeConsumeRequest>, JsonRejection>,
) -> Response {
    if !admin_secret_ok(&state.config, &headers) {
        return failure(&ApiError::unauthorized("Unauthorized"));
    }
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let code = match requested_code(request.code) {
        Ok(code) => code,
        Err(err) => return failure(&err),
    };
    match state.access_codes.consume(&code, None).await {
        Ok(status) => json_ok(&CodeConsumeResponse {
            success: true,
            uses: status.uses,
            max_uses: status.max_uses,
        }),
        Err(err) => failure(&access_code_error(err)),
    }
}

/// POST /api/admin/delete-farmer: rollback behind the admin secret.
pub(crate) async fn delete_farmer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DeleteFarmerRequest>, JsonRejection>,
) -> Response {
    if !admin_secret_ok(&state.config, &headers) {
        return failure(&ApiError::unauthorized("Unauthorized"));
    }
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let Some(uid) = request.uid.filter(|uid| !uid.is_empty()) else {
        return failure(&ApiError::missing_field("uid"));
    };
    let details = state.admin.delete_farmer(&uid).await;
    if !details.doc_deleted {
        let body = Json(json!({
            "success": false,
            "code": ApiErrorCode::StoreFailed.as_str(),
            "message": "Failed to delete farmer doc",
            "details": details,
        }));
        return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
    }
    json_ok(&DeleteFarmerResponse {
        success: true,
        details,
    })
}

/// POST /api/admin/delete-farmer-client: callers roll back their own
/// account with a bearer token; both steps reported, always 200.
pub(crate) async fn delete_farmer_client_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let user = match bearer_user(&state.identity, &headers).await {
        Ok(user) => user,
        Err(err) => return failure(&err),
    };
    let details = state.admin.delete_farmer(&user.uid).await;
    json_ok(&DeleteFarmerResponse {
        success: true,
        details,
    })
}

/// POST /api/advice: crop advisory. Anonymous works; a bearer token adds
/// best-effort history persistence.
pub(crate) async fn advice_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AdviceRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let has_crops = request.crops.as_ref().is_some_and(|crops| !crops.is_empty());
    if !has_crops || request.weather.is_none() {
        return failure(&ApiError::new(ApiErrorCode::MissingField, "Missing data"));
    }
    let farmer = optional_bearer_user(&state.identity, &headers).await;
    match state.advisories.crop_advice(&request, farmer.as_ref()).await {
        Ok(outcome) => json_ok(&outcome),
        Err(err) => {
            error!("advice generation failed: {err}");
            failure(&ApiError::new(
                ApiErrorCode::Internal,
                "Failed to fetch AI advice",
            ))
        }
    }
}

/// POST /api/fragility: regional risk summary.
pub(crate) async fn fragility_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<FragilityRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let farmer = optional_bearer_user(&state.identity, &headers).await;
    match state.advisories.fragility(&request, farmer.as_ref()).await {
        Ok(outcome) => json_ok(&outcome),
        Err(err) => {
            error!("fragility generation failed: {err}");
            failure(&ApiError::new(
                ApiErrorCode::Internal,
                "Failed to fetch fragility advisory",
            ))
        }
    }
}

/// POST /api/weather: provider proxy, payload relayed unchanged.
pub(crate) async fn weather_handler(
    State(state): State<AppState>,
    body: Result<Json<WeatherRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let (Some(lat), Some(lon)) = (request.lat, request.lon) else {
        return failure(&ApiError::new(
            ApiErrorCode::MissingField,
            "Missing coordinates",
        ));
    };
    match state.weather.current(lat, lon).await {
        Ok(payload) => json_ok(&payload),
        Err(err) => {
            error!("weather proxy failed: {err}");
            failure(&ApiError::new(ApiErrorCode::Internal, "Weather fetch failed"))
        }
    }
}

/// GET /api/paystack/config: publishable key and the package price table.
pub(crate) async fn paystack_config_handler(State(state): State<AppState>) -> Response {
    let prices = state.config.prices;
    let mut packages = BTreeMap::new();
    for plan in [Plan::Monthly, Plan::Yearly] {
        packages.insert(
            plan.as_str().to_string(),
            ConfigPackage {
                id: plan.as_str().to_string(),
                label: plan.label().to_string(),
                amount_major: prices.price_major(plan),
            },
        );
    }
    json_ok(&PaymentConfigResponse {
        success: true,
        public_key: state.config.paystack_public_key.clone(),
        packages,
    })
}

/// POST /api/paystack: initialize a gateway transaction for a plan.
pub(crate) async fn paystack_initialize_handler(
    State(state): State<AppState>,
    body: Result<Json<InitializeRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let Some(email) = request.email.filter(|email| !email.is_empty()) else {
        return failure(&ApiError::new(
            ApiErrorCode::MissingField,
            "Email is required",
        ));
    };
    let Some(plan_raw) = request.plan.filter(|plan| !plan.is_empty()) else {
        return failure(&ApiError::missing_field("plan"));
    };
    let plan = match Plan::parse(&plan_raw) {
        Ok(plan) => plan,
        Err(err) => return failure(&ApiError::new(ApiErrorCode::InvalidBody, err.to_string())),
    };
    match state.payments.initialize(&email, plan).await {
        Ok(initialized) => json_ok(&InitializeResponse {
            success: true,
            authorization_url: initialized.authorization_url,
            reference: initialized.reference,
            access_code: initialized.access_code,
        }),
        Err(err) => {
            error!("payment initialization failed: {err}");
            failure(&ApiError::new(
                ApiErrorCode::Internal,
                "Failed to initialize payment",
            ))
        }
    }
}

/// POST /api/paystack/verify: the only origin-restricted route. Confirms
/// the reference with the gateway, then drives the subscription ledger.
pub(crate) async fn paystack_verify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Response {
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state
        .config
        .cors_allowed_origins
        .iter()
        .any(|allowed| allowed == origin)
    {
        return failure(&ApiError::new(
            ApiErrorCode::OriginNotAllowed,
            "Origin not allowed",
        ));
    }
    let Ok(Json(request)) = body else {
        return failure(&ApiError::invalid_body());
    };
    let Some(reference) = request.reference.filter(|r| !r.is_empty()) else {
        return failure(&ApiError::new(
            ApiErrorCode::MissingField,
            "Reference required",
        ));
    };
    match state.payments.verify(&reference).await {
        Ok(data) => json_ok(&VerifyResponse {
            success: true,
            data,
        }),
        Err(PaymentError::Unsuccessful) => failure(&ApiError::new(
            ApiErrorCode::PaymentUnsuccessful,
            "Payment unsuccessful",
        )),
        Err(PaymentError::Upstream(err)) => {
            error!("payment verification failed: {err}");
            failure(&ApiError::new(
                ApiErrorCode::UpstreamFailed,
                "Payment verification failed",
            ))
        }
    }
}
