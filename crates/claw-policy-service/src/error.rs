//! Error kinds mapped to HTTP status codes, per the fixed error table.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Every failure mode a handler can return, mapped directly to an HTTP
/// status and a short, stable label used both in the response body and as
/// the error-counter key.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or semantically invalid request payload.
    #[error("{0}")]
    Validation(String),

    /// Missing or unparseable bearer token.
    #[error("missing or invalid token")]
    Unauthenticated,

    /// Caller is authenticated but not authorized for the requested apps.
    #[error("one or more applications cannot be found or accessed")]
    Forbidden,

    /// The referenced resource does not exist.
    #[error("not found")]
    NotFound,

    /// Backend/store/infra failure.
    #[error("internal error")]
    Backend(#[from] claw_policy_store::PolicyStoreError),

    /// The configured identity provider could not be reached or returned
    /// an unexpected shape.
    #[error("identity provider error: {0}")]
    Identity(String),

    /// The internal API's mTLS listener could not be configured from
    /// `ca_cert_file`/`server_cert_file`/`server_key_file`.
    #[error("tls configuration error: {0}")]
    Tls(String),
}

impl ServiceError {
    /// The short, stable label used for the error counter and logs (e.g.
    /// `ExternalPoliciesCreateError`).
    #[must_use]
    pub fn label(&self, context: &str) -> String {
        let kind = match self {
            Self::Validation(_) => "Validation",
            Self::Unauthenticated => "Unauthenticated",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::Backend(_) => "Backend",
            Self::Identity(_) => "Identity",
            Self::Tls(_) => "Tls",
        };
        format!("{context}{kind}Error")
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Backend(_) | Self::Identity(_) | Self::Tls(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
