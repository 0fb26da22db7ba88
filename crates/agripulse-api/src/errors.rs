// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Stable machine codes for every failure the HTTP surface can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorCode {
    InvalidBody,
    MissingField,
    Unauthorized,
    OriginNotAllowed,
    InvalidCode,
    CodeExpired,
    PaymentUnsuccessful,
    UpstreamFailed,
    StoreFailed,
    Internal,
}

impl ApiErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidBody => "InvalidBody",
            Self::MissingField => "MissingField",
            Self::Unauthorized => "Unauthorized",
            Self::OriginNotAllowed => "OriginNotAllowed",
            Self::InvalidCode => "InvalidCode",
            Self::CodeExpired => "CodeExpired",
            Self::PaymentUnsuccessful => "PaymentUnsuccessful",
            Self::UpstreamFailed => "UpstreamFailed",
            Self::StoreFailed => "StoreFailed",
            Self::Internal => "Internal",
        }
    }

    /// Central taxonomy mapping: validation and business-rule failures are
    /// 400s, auth failures 401/403, upstream verification 502, everything
    /// else a generic 500.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidBody | Self::MissingField | Self::InvalidCode | Self::CodeExpired
            | Self::PaymentUnsuccessful => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OriginNotAllowed => StatusCode::FORBIDDEN,
            Self::UpstreamFailed => StatusCode::BAD_GATEWAY,
            Self::StoreFailed | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body carried inside the `success: false` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing_field(name: &str) -> Self {
        Self::new(ApiErrorCode::MissingField, format!("{name} required"))
    }

    #[must_use]
    pub fn invalid_body() -> Self {
        Self::new(ApiErrorCode::InvalidBody, "Invalid JSON body")
    }

    #[must_use]
    pub fn unauthorized(message: &str) -> Self {
        Self::new(ApiErrorCode::Unauthorized, message)
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::new(ApiErrorCode::Internal, "Server error")
    }
}
