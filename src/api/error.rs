//! Mapping of domain errors onto HTTP responses.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

/// Error returned by every handler.
///
/// Server-side failures are logged in full but only a generic message reaches
/// the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 401 for requests that failed authentication.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 400 for requests that could not be understood.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Error::SoldOut { .. } => (StatusCode::CONFLICT, "SOLD_OUT"),
            Error::AlreadyCancelled { .. } => (StatusCode::CONFLICT, "ALREADY_CANCELLED"),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            Error::PricesLocked { .. } => (StatusCode::CONFLICT, "PRICES_LOCKED"),
            Error::AvailabilityInUse { .. } => (StatusCode::CONFLICT, "AVAILABILITY_IN_USE"),
            Error::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            Error::MissingRefundDetails => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_REFUND_DETAILS")
            }
            Error::AmountMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "AMOUNT_MISMATCH"),
            Error::DepartureClosed { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "DEPARTURE_CLOSED"),
            Error::NotBookable { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "NOT_BOOKABLE"),
            Error::Validation { .. }
            | Error::InvalidAmount { .. }
            | Error::InvalidParticipants { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Error::Config { .. } | Error::Database(_) | Error::Io(_) | Error::EnvVar(_) => {
                tracing::error!(error = %err, "Internal server error");
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "An internal error occurred",
                );
            }
        };
        Self::new(status, code, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
