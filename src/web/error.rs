//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::BottleError;

/// Message for missing or malformed request fields.
pub const INVALID_ARGUMENTS: &str = "Invalid arguments.";
/// Message for a send time that is not in the future.
pub const INVALID_TIME: &str = "Invalid time.";
/// Message for an address with too many unconfirmed bottles.
pub const TOO_MANY_UNCONFIRMED: &str = "Too many unconfirmed.";
/// Message for a confirmation id that matches no bottle.
pub const INVALID_DOCUMENT: &str = "Invalid document.";

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Unprocessable entity (422).
    UnprocessableEntity,
    /// Too many requests from one client (429).
    TooManyRequests,
    /// Too many unconfirmed bottles for one address (451).
    RateLimited,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::RateLimited => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an unprocessable entity error.
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnprocessableEntity, message)
    }

    /// Create a too-many-requests error.
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TooManyRequests, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The client-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<BottleError> for ApiError {
    fn from(err: BottleError) -> Self {
        match &err {
            BottleError::InvalidArgument(reason) => {
                tracing::debug!(reason = %reason, "Rejected request arguments");
                ApiError::unprocessable(INVALID_ARGUMENTS)
            }
            BottleError::InvalidTime => ApiError::bad_request(INVALID_TIME),
            BottleError::RateLimited => ApiError::new(ErrorCode::RateLimited, TOO_MANY_UNCONFIRMED),
            BottleError::NotFound(_) => ApiError::bad_request(INVALID_DOCUMENT),
            BottleError::DeliveryFailure(msg) => {
                tracing::error!("Mail delivery failed: {}", msg);
                ApiError::internal("Failed to send mail")
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status() {
        assert_eq!(ErrorCode::BadRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::UnprocessableEntity.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ErrorCode::RateLimited.status_code().as_u16(), 451);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_bottle_error() {
        let err = ApiError::from(BottleError::InvalidArgument("email".into()));
        assert_eq!(err.code(), ErrorCode::UnprocessableEntity);
        assert_eq!(err.message(), INVALID_ARGUMENTS);

        let err = ApiError::from(BottleError::InvalidTime);
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(err.message(), INVALID_TIME);

        let err = ApiError::from(BottleError::RateLimited);
        assert_eq!(err.code(), ErrorCode::RateLimited);
        assert_eq!(err.message(), TOO_MANY_UNCONFIRMED);

        let err = ApiError::from(BottleError::NotFound("bottle".into()));
        assert_eq!(err.code(), ErrorCode::BadRequest);
        assert_eq!(err.message(), INVALID_DOCUMENT);

        let err = ApiError::from(BottleError::DeliveryFailure("HTTP 401".into()));
        assert_eq!(err.code(), ErrorCode::InternalError);

        let err = ApiError::from(BottleError::Database("locked".into()));
        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(!err.message().contains("locked"));
    }

    #[test]
    fn test_error_serialization() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: ErrorCode::RateLimited,
                message: TOO_MANY_UNCONFIRMED.to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
        assert_eq!(json["error"]["message"], "Too many unconfirmed.");
    }
}
