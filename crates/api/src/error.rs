//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reservation::ReservationError;
use serde::Serialize;

/// Error code carried by every failed reservation response.
const ERROR_CODE: &str = "03";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Reservation workflow error.
    Reservation(ReservationError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Reservation(err) => reservation_error_to_response(err),
        };

        let body = ErrorBody {
            code: ERROR_CODE,
            message,
        };
        (status, axum::Json(body)).into_response()
    }
}

fn reservation_error_to_response(err: ReservationError) -> (StatusCode, String) {
    match &err {
        ReservationError::InvalidInput(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ReservationError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        ReservationError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        // Already logged with operation context by the service.
        ReservationError::Storage(_) | ReservationError::ConsistencyViolation(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        ),
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        ApiError::Reservation(err)
    }
}
