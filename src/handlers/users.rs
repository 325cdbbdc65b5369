//! User administration endpoints (admin only).
//!
//! - POST /api/v1/users - Create a user
//! - GET /api/v1/users - List live users
//! - DELETE /api/v1/users/{id} - Soft delete a user

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    extract::{AppJson, AppPath},
    middleware::auth::AuthContext,
    models::user::{CreateUserRequest, UserResponse},
    response::ApiResponse,
    services::user_service,
};

/// Create a user.
///
/// # Response
///
/// - **201 Created**: the new user
/// - **400**: invalid username, password or email
/// - **409**: username already taken
pub async fn create_user(
    State(pool): State<DbPool>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = user_service::create_user(&pool, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

pub async fn list_users(
    State(pool): State<DbPool>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, AppError> {
    let users = user_service::list_users(&pool).await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(Into::into).collect(),
    )))
}

/// Soft delete a user. Their sessions are revoked at once; their work
/// orders stay for auditing.
pub async fn delete_user(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    user_service::soft_delete_user(&pool, auth.user_id, user_id).await?;

    Ok(Json(ApiResponse::message("User deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::test_auth;
    use crate::models::user::UserRole;
    use crate::response::send_empty;
    use crate::state::test_state;
    use axum::{Router, routing::delete};

    #[tokio::test]
    async fn bad_user_id_is_a_validation_error() {
        let router = Router::new()
            .route("/api/v1/users/{id}", delete(delete_user))
            .layer(Extension(test_auth(UserRole::Admin)))
            .with_state(test_state());

        let (status, body) = send_empty(router, "DELETE", "/api/v1/users/42").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
