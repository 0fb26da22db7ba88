// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOWED_METHODS: &str = "POST,GET,OPTIONS";
const ALLOWED_HEADERS: &str = "content-type,accept,origin,authorization,x-admin-secret";

fn origin_header(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.len() <= 256)
        .map(str::to_string)
}

fn allow_headers(response: &mut Response, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        response
            .headers_mut()
            .insert("access-control-allow-origin", value);
    }
    response.headers_mut().insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    response.headers_mut().insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response.headers_mut().insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
}

pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = origin_header(&request);
    let allowed = origin
        .as_deref()
        .is_some_and(|o| state.config.cors_allowed_origins.iter().any(|x| x == o));

    if request.method() == axum::http::Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if allowed {
            if let Some(origin) = &origin {
                allow_headers(&mut response, origin);
            }
        }
        return response;
    }

    let mut response = next.run(request).await;
    if allowed {
        if let Some(origin) = &origin {
            allow_headers(&mut response, origin);
            response
                .headers_mut()
                .insert("vary", HeaderValue::from_static("Origin"));
        }
    }
    response
}
