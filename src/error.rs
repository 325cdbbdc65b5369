//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses carrying the standard `{ code, success, message, data }` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::response::ApiResponse;

/// Application-wide error type.
///
/// Each variant maps to one of the flat string codes clients switch on
/// and to an HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    Validation(String),

    /// Missing, expired or revoked session, or bad login credentials.
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but the role does not allow the operation.
    #[error("Permission denied")]
    Forbidden,

    /// Entity missing, or owned by another user.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique value already taken.
    #[error("{0}")]
    Conflict(String),

    /// Work order status does not permit the requested change.
    #[error("{0}")]
    InvalidStatus(String),

    /// The gateway answered with a non-success code. The work order was
    /// still persisted (as FAILED) and is returned in `data`.
    #[error("{message}")]
    ThirdPartyRejected {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The gateway could not be reached or answered garbage.
    #[error("Third-party service unavailable: {0}")]
    ThirdPartyUnavailable(String),

    /// Anything else that is our fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Flat error code placed in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::ThirdPartyRejected { .. } | AppError::ThirdPartyUnavailable(_) => {
                "THIRD_PARTY_ERROR"
            }
            AppError::Database(_) | AppError::Internal(_) => "SYSTEM_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidStatus(_) => StatusCode::CONFLICT,
            AppError::ThirdPartyRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ThirdPartyUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "success": false,
///   "message": "amount_cents must be positive",
///   "data": null
/// }
/// ```
///
/// Database and internal errors hide their details from the client; they are logged instead.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let (message, data) = match self {
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "database error");
                ("An internal error occurred".to_string(), None)
            }
            AppError::Internal(ref e) => {
                tracing::error!(error = %e, "internal error");
                ("An internal error occurred".to_string(), None)
            }
            AppError::ThirdPartyRejected { message, data } => (message, data),
            other => (other.to_string(), None),
        };

        (status, Json(ApiResponse::failure(code, message, data))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_uses_envelope() {
        let response = AppError::Validation("amount_cents must be positive".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "code": "VALIDATION_ERROR",
                "success": false,
                "message": "amount_cents must be positive",
                "data": null
            })
        );
    }

    #[tokio::test]
    async fn database_error_hides_details() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["code"], "SYSTEM_ERROR");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn third_party_rejection_carries_work_order() {
        let response = AppError::ThirdPartyRejected {
            message: "account suspended".to_string(),
            data: Some(json!({ "status": "FAILED" })),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["code"], "THIRD_PARTY_ERROR");
        assert_eq!(body["message"], "account suspended");
        assert_eq!(body["data"]["status"], "FAILED");
    }

    #[test]
    fn status_errors_map_to_conflict() {
        let err = AppError::InvalidStatus("work order is COMPLETED".to_string());
        assert_eq!(err.code(), "INVALID_STATUS");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("Work order").to_string(), "Work order not found");
    }
}
