use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::{services::ServiceError, utils::logger::LOGGER};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<HashMap<String, Vec<String>>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub enum AppError {
    ValidationError(HashMap<String, Vec<String>>),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    UnsupportedMediaType(String),
    PayloadTooLarge(String),
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type().to_string();

        let (message, details) = match self {
            AppError::ValidationError(errors) => ("Validation failed".to_string(), Some(errors)),
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::InternalServerError(msg) => (msg, None),
        };

        let error_response = ErrorResponse {
            error: error_type,
            message,
            details,
            timestamp: Utc::now(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut error_map = HashMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("Invalid value for field '{}'", field))
                })
                .collect();
            error_map.insert(field.to_string(), messages);
        }

        AppError::ValidationError(error_map)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    AppError::Conflict("Resource already exists".to_string())
                } else {
                    LOGGER.log_error(db_err.message(), json!({"error_type": "database"}));
                    AppError::InternalServerError("Database error occurred".to_string())
                }
            }
            other => {
                LOGGER.log_error(&other.to_string(), json!({"error_type": "database"}));
                AppError::InternalServerError("Database error occurred".to_string())
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound(msg) => AppError::NotFound(msg),
            ServiceError::Duplicate(msg) => AppError::Conflict(msg),
            ServiceError::Forbidden(msg) => AppError::Forbidden(msg),
            ServiceError::InvalidState(msg) => AppError::BadRequest(msg),
            ServiceError::UnsupportedMedia(msg) => AppError::UnsupportedMediaType(msg),
            ServiceError::TooLarge(msg) => AppError::PayloadTooLarge(msg),
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized("Invalid credentials".to_string())
            }
            ServiceError::Database(db_err) => AppError::from(db_err),
            ServiceError::Storage(io_err) => {
                LOGGER.log_error(&io_err.to_string(), json!({"error_type": "storage"}));
                AppError::InternalServerError("File storage error".to_string())
            }
            ServiceError::Internal(msg) => {
                LOGGER.log_error(&msg, json!({"error_type": "internal"}));
                AppError::InternalServerError("Internal error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_statuses() {
        let cases = [
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Duplicate("x".into()), StatusCode::CONFLICT),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::UnsupportedMedia("x".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (ServiceError::TooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                ServiceError::Database(sqlx::Error::RowNotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::Storage(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (service_error, expected) in cases {
            assert_eq!(AppError::from(service_error).status_code(), expected);
        }
    }

    #[test]
    fn test_message_is_kept() {
        match AppError::from(ServiceError::InvalidState("Payment required to enroll".into())) {
            AppError::BadRequest(msg) => assert_eq!(msg, "Payment required to enroll"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_into_response_status() {
        let response = AppError::Conflict("Already enrolled".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::ValidationError(HashMap::new()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
