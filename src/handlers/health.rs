//! Health check endpoint for service monitoring.

use crate::{db::DbPool, error::AppError, response::ApiResponse};
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
///
/// Returns service status and database connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "code": "SUCCESS",
///   "success": true,
///   "message": "OK",
///   "data": {
///     "status": "healthy",
///     "database": "connected",
///     "timestamp": "2025-12-21T19:00:00Z"
///   }
/// }
/// ```
///
/// If the database is unreachable, returns the standard `SYSTEM_ERROR` response.
pub async fn health_check(
    State(pool): State<DbPool>,
) -> Result<Json<ApiResponse<HealthResponse>>, AppError> {
    // Verify database connectivity with simple query
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: "connected".to_string(),
        timestamp: Utc::now(),
    })))
}
