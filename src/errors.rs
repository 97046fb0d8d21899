use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::TARGET_DB;

/// Request-boundary error taxonomy. Every failure in the request pipeline is
/// mapped onto one of these before leaving a handler; store-level detail is
/// logged but never serialized into the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required parameters.")]
    MissingParameters,

    #[error("Incorrect timestamp format: timestamps must be ISO-8601.")]
    IncorrectTimestampFormat,

    #[error("Incorrect parameter format.")]
    IncorrectParameterFormat,

    #[error("Invalid date order: the start date must be before the end date.")]
    InvalidDateOrder,

    #[error("{0}")]
    InvalidGrouping(String),

    #[error("Database error (please contact administrator if problem persists).")]
    Database(#[from] sqlx::Error),

    #[error("{0} already exists.")]
    AlreadyExists(&'static str),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingParameters => "missing_parameters",
            ApiError::IncorrectTimestampFormat => "incorrect_timestamp_format",
            ApiError::IncorrectParameterFormat => "incorrect_parameter_format",
            ApiError::InvalidDateOrder => "invalid_date_order",
            ApiError::InvalidGrouping(_) => "invalid_grouping",
            ApiError::Database(_) => "database_error",
            ApiError::AlreadyExists(_) => "already_exists",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameters
            | ApiError::IncorrectTimestampFormat
            | ApiError::IncorrectParameterFormat
            | ApiError::InvalidDateOrder
            | ApiError::InvalidGrouping(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Database(ref err) = self {
            error!(target: TARGET_DB, "Store adapter failure: {:?}", err);
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_bad_request() {
        assert_eq!(ApiError::MissingParameters.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::IncorrectTimestampFormat.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidDateOrder.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_errors_are_generic() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The message must not leak adapter internals.
        assert!(!err.to_string().contains("Pool"));
    }
}
