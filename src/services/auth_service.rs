//! Authentication: password hashing, sessions, and the bootstrap administrator.
//!
//! # Secrets at Rest
//!
//! - Passwords: `HMAC-SHA256(key = per-user random salt, message = password)`, hex encoded.
//! - Session tokens: 32 random bytes handed to the client; only `SHA-256(token)` is stored.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::user::{Session, User, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Random 16-byte salt, hex encoded (32 characters).
pub fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC key length is valid");
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison against the stored digest.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let Ok(expected) = hex::decode(expected_hash) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC key length is valid");
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

/// Opaque session token: 64 hex characters (32 random bytes).
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check credentials and open a new session.
///
/// Unknown usernames, wrong passwords and soft-deleted users all produce the
/// same `UNAUTHORIZED` answer.
pub async fn login(
    pool: &DbPool,
    config: &Config,
    username: &str,
    password: &str,
) -> Result<(String, Session, User), AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE username = $1 AND deleted_at IS NULL",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !user.can_authenticate() || !verify_password(password, &user.password_salt, &user.password_hash)
    {
        tracing::warn!(%username, "login rejected");
        return Err(AppError::Unauthorized);
    }

    let (token, session) = create_session(pool, user.id, Utc::now() + config.session_ttl()).await?;
    tracing::info!(user_id = %user.id, session_id = %session.id, "user logged in");

    Ok((token, session, user))
}

pub async fn create_session(
    pool: &DbPool,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<(String, Session), AppError> {
    let token = generate_session_token();

    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok((token, session))
}

/// Resolve a raw token to its live session and non-deleted user.
pub async fn authenticate_token(
    pool: &DbPool,
    token: &str,
) -> Result<(Session, User), AppError> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT s.*
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1
          AND s.expires_at > NOW()
          AND u.deleted_at IS NULL
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(session.user_id)
        .fetch_one(pool)
        .await?;

    if !user.can_authenticate() {
        return Err(AppError::Unauthorized);
    }

    Ok((session, user))
}

/// Slide the session forward when it is used close to its expiry.
///
/// Returns whether `expires_at` moved, so cookie clients can be handed a
/// cookie with a fresh `Max-Age`.
pub async fn touch_session(
    pool: &DbPool,
    config: &Config,
    session: &Session,
) -> Result<bool, AppError> {
    let now = Utc::now();
    if session.expires_at - now > config.session_refresh_window() {
        return Ok(false);
    }

    sqlx::query("UPDATE sessions SET expires_at = $1, last_seen_at = $2 WHERE id = $3")
        .bind(now + config.session_ttl())
        .bind(now)
        .bind(session.id)
        .execute(pool)
        .await?;

    tracing::debug!(session_id = %session.id, "session extended");
    Ok(true)
}

/// Replace the session with a fresh token and a full TTL.
pub async fn refresh_session(
    pool: &DbPool,
    config: &Config,
    session_id: Uuid,
) -> Result<(String, Session), AppError> {
    let token = generate_session_token();
    let now = Utc::now();

    let session = sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET token_hash = $1, expires_at = $2, last_seen_at = $3
        WHERE id = $4 AND expires_at > $3
        RETURNING *
        "#,
    )
    .bind(hash_token(&token))
    .bind(now + config.session_ttl())
    .bind(now)
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok((token, session))
}

pub async fn delete_session(pool: &DbPool, session_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create the configured administrator if no live user holds that username.
pub async fn ensure_bootstrap_admin(pool: &DbPool, config: &Config) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(());
    }

    let salt = generate_salt();
    sqlx::query(
        r#"
        INSERT INTO users (username, display_name, password_hash, password_salt, role)
        VALUES ($1, $1, $2, $3, $4)
        "#,
    )
    .bind(username)
    .bind(hash_password(password, &salt))
    .bind(&salt)
    .bind(UserRole::Admin.as_str())
    .execute(pool)
    .await?;

    tracing::info!(%username, "bootstrap administrator created");
    Ok(())
}
