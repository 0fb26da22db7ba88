// SPDX-License-Identifier: Apache-2.0

use crate::config::ApiConfig;
use crate::upstream::{AuthUser, IdentityProvider};
use agripulse_api::ApiError;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::warn;

/// Shared-secret guard for the server-to-server routes. An unset secret
/// keeps those routes permanently locked.
pub(crate) fn admin_secret_ok(config: &ApiConfig, headers: &HeaderMap) -> bool {
    let Some(secret) = config.admin_secret.as_deref() else {
        return false;
    };
    headers
        .get("x-admin-secret")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| provided == secret)
}

/// Mandatory bearer auth: token missing or unverifiable is a 401.
pub(crate) async fn bearer_user(
    identity: &Arc<dyn IdentityProvider>,
    headers: &HeaderMap,
) -> Result<AuthUser, ApiError> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(ApiError::unauthorized("Missing token"));
    };
    identity.verify_token(token).await.map_err(|err| {
        warn!("token verification failed: {err}");
        ApiError::unauthorized("Invalid token")
    })
}

/// Opportunistic bearer auth for routes that work anonymously but persist
/// history for known farmers. A bad token degrades to anonymous.
pub(crate) async fn optional_bearer_user(
    identity: &Arc<dyn IdentityProvider>,
    headers: &HeaderMap,
) -> Option<AuthUser> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")?;
    match identity.verify_token(token).await {
        Ok(user) => Some(user),
        Err(err) => {
            warn!("optional token ignored: {err}");
            None
        }
    }
}
