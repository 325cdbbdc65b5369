//! Login, logout, session refresh and current-user endpoints.
//!
//! - POST /api/v1/auth/login - Open a session (public)
//! - POST /api/v1/auth/logout - Close the current session
//! - POST /api/v1/auth/refresh - Rotate the session token
//! - GET /api/v1/auth/me - Current user

use axum::{
    Extension, Json,
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    extract::AppJson,
    middleware::auth::{AuthContext, clear_session_cookie, session_cookie},
    models::user::{LoginRequest, SessionResponse, User, UserResponse},
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

/// Log in with username and password.
///
/// # Request Body
///
/// ```json
/// { "username": "acme_ops", "password": "s3cret-pass" }
/// ```
///
/// # Response
///
/// The session token is returned in the body for API clients and set as an
/// HttpOnly cookie for browsers. Deleted users and bad credentials both get
/// `401 UNAUTHORIZED`.
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (token, session, user) = auth_service::login(
        &state.pool,
        &state.config,
        request.username.trim(),
        &request.password,
    )
    .await?;

    let cookie = session_cookie(&token, &state.config);
    let body = SessionResponse {
        token,
        expires_at: session.expires_at,
        user: user.into(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(ApiResponse::success(body))))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    auth_service::delete_session(&state.pool, auth.session_id).await?;
    tracing::info!(user_id = %auth.user_id, "user logged out");

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.config))],
        Json(ApiResponse::message("Logged out")),
    ))
}

/// Issue a new token for the current session and reset its expiry.
/// The old token stops working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let (token, session) =
        auth_service::refresh_session(&state.pool, &state.config, auth.session_id).await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let cookie = session_cookie(&token, &state.config);
    let body = SessionResponse {
        token,
        expires_at: session.expires_at,
        user: user.into(),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(ApiResponse::success(body))))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(ApiResponse::success(user.into())))
}
