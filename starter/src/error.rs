//! API error codes and the JSON envelope they're returned in, plus the
//! `anyhow`-boundary error type used by HTTP handlers and the startup
//! sequencer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Stable wire codes, ordinals fixed by the system this starter replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ApiErrorCode {
    NoError = 0,
    InternalError = 1,
    PoolNotFound = 2,
    PoolTooSmall = 3,
    PoolNoResources = 4,
    PoolLocked = 5,
    InvalidRequest = 6,
}

impl ApiErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            ApiErrorCode::NoError => "No error. Operation successful",
            ApiErrorCode::InternalError => "Internal error occurred. Please, try again later or contact support service",
            ApiErrorCode::PoolNotFound => "Target resource pool was not found",
            ApiErrorCode::PoolTooSmall => "Target resource pool capacity is too small",
            ApiErrorCode::PoolNoResources => "Unable to run fuzzer: not enough CPU/RAM in target resource pool",
            ApiErrorCode::PoolLocked => "Target resource pool is locked. Please, try again later, when it will be unlocked",
            ApiErrorCode::InvalidRequest => "Request failed validation",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::NoError => StatusCode::OK,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::PoolNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::PoolTooSmall | ApiErrorCode::PoolNoResources | ApiErrorCode::PoolLocked => {
                StatusCode::CONFLICT
            }
            ApiErrorCode::InvalidRequest => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: i32,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// An HTTP-facing API error: a known [`ApiErrorCode`], or an opaque
/// internal failure logged at the boundary and reported as
/// [`ApiErrorCode::InternalError`] without leaking its detail to the
/// client.
#[derive(Debug)]
pub struct ApiError {
    code: ApiErrorCode,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode) -> Self {
        Self { code, source: None }
    }

    pub fn code(&self) -> ApiErrorCode {
        self.code
    }
}

impl From<ApiErrorCode> for ApiError {
    fn from(code: ApiErrorCode) -> Self {
        Self::new(code)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self { code: ApiErrorCode::InternalError, source: Some(err) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.source {
            tracing::error!(error = %err, "internal error handling request");
        }
        let body = ErrorEnvelope {
            error: ErrorBody { code: self.code as i32, message: self.code.message() },
        };
        (self.code.status(), Json(body)).into_response()
    }
}

/// The success counterpart of [`ApiError`]'s envelope, returned with
/// `ApiErrorCode::NoError` by every handler that completes without error.
pub struct ApiOk(pub StatusCode);

impl IntoResponse for ApiOk {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody { code: ApiErrorCode::NoError as i32, message: ApiErrorCode::NoError.message() },
        };
        (self.0, Json(body)).into_response()
    }
}
