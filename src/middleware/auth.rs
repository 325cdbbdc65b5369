//! Session authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session token from the Authorization header or the session cookie
//! 2. Hash it and look up a live session of a non-deleted user
//! 3. Slide the session forward if it is close to expiry, re-issuing the
//!    cookie for browser clients
//! 4. Inject authentication context into the request
//! 5. Reject unauthorized requests with HTTP 401

use axum::{
    Extension,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::user::UserRole;
use crate::services::auth_service;
use crate::state::AppState;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session_token";

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extensions; handlers extract it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub session_id: Uuid,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn ensure_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Owner restriction for queries: `None` lets admins see every row,
    /// customers are limited to their own.
    pub fn owner_filter(&self) -> Option<Uuid> {
        if self.is_admin() {
            None
        } else {
            Some(self.user_id)
        }
    }
}

/// Read a cookie value out of the `Cookie` request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a session token for a full TTL.
pub fn session_cookie(token: &str, config: &Config) -> String {
    let max_age = config.session_ttl().num_seconds();
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}{secure}")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &Config) -> String {
    let secure = if config.cookie_secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0{secure}")
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Bearer token first, then the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_value(headers, SESSION_COOKIE))
}

/// Append a renewed session cookie unless the handler already set one
/// (login, refresh and logout manage the cookie themselves).
fn renew_cookie(response: &mut Response, token: &str, config: &Config) {
    if response.headers().contains_key(header::SET_COOKIE) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&session_cookie(token, config)) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

/// Session authentication middleware function.
///
/// # Flow
///
/// 1. Take the token from `Authorization: Bearer <token>` or the `session_token` cookie
/// 2. Hash it and query for an unexpired session whose user is not soft-deleted
/// 3. Extend the session if it is used within the refresh window
/// 4. Inject `AuthContext` into the request and call the next handler
/// 5. If the session was extended and came from the cookie, send the cookie
///    back with a fresh `Max-Age`
///
/// Missing, unknown and expired tokens all produce `401 UNAUTHORIZED`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let from_cookie = bearer_token(request.headers()).is_none();
    let token = session_token(request.headers())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let (session, user) = auth_service::authenticate_token(&state.pool, &token).await?;
    let extended = auth_service::touch_session(&state.pool, &state.config, &session).await?;

    let auth_context = AuthContext {
        user_id: user.id,
        role: user.role(),
        username: user.username,
        session_id: session.id,
    };

    request.extensions_mut().insert(auth_context);

    let mut response = next.run(request).await;
    if extended && from_cookie {
        renew_cookie(&mut response, &token, &state.config);
    }

    Ok(response)
}

/// Rejects non-admin callers with `403 FORBIDDEN`. Must run after `auth_middleware`.
pub async fn require_admin(
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth.ensure_admin()?;
    Ok(next.run(request).await)
}

/// Context for handler tests that bypass the session lookup.
#[cfg(test)]
pub(crate) fn test_auth(role: UserRole) -> AuthContext {
    AuthContext {
        user_id: Uuid::new_v4(),
        username: "tester".to_string(),
        role,
        session_id: Uuid::new_v4(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::body::Body;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer abc"),
            (header::COOKIE, "session_token=def"),
        ]);
        assert_eq!(session_token(&map), Some("abc"));
    }

    #[test]
    fn cookie_is_found_among_others() {
        let map = headers(&[
            (header::COOKIE, "theme=dark"),
            (header::COOKIE, "lang=zh; session_token=def ; x=1"),
        ]);
        assert_eq!(session_token(&map), Some("def"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer "),
            (header::COOKIE, "session_token="),
        ]);
        assert_eq!(session_token(&map), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn customers_are_scoped_to_themselves() {
        let user_id = Uuid::new_v4();
        let customer = AuthContext {
            user_id,
            username: "acme".to_string(),
            role: UserRole::Customer,
            session_id: Uuid::new_v4(),
        };
        assert_eq!(customer.owner_filter(), Some(user_id));
        assert!(matches!(customer.ensure_admin(), Err(AppError::Forbidden)));

        let admin = AuthContext {
            role: UserRole::Admin,
            ..customer
        };
        assert_eq!(admin.owner_filter(), None);
        assert!(admin.ensure_admin().is_ok());
    }

    #[test]
    fn cookie_attributes() {
        let mut config = test_config("https://gateway.example.com");
        let cookie = session_cookie("abc", &config);
        assert_eq!(
            cookie,
            "session_token=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=86400"
        );

        config.cookie_secure = true;
        assert!(session_cookie("abc", &config).ends_with("; Secure"));
        assert!(clear_session_cookie(&config).contains("Max-Age=0"));
    }

    #[test]
    fn renewed_cookie_carries_full_ttl() {
        let config = test_config("https://gateway.example.com");
        let mut response = Response::new(Body::empty());
        renew_cookie(&mut response, "abc", &config);

        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0], session_cookie("abc", &config).as_str());
    }

    #[test]
    fn renewal_leaves_handler_cookies_alone() {
        let config = test_config("https://gateway.example.com");
        let mut response = Response::new(Body::empty());
        response.headers_mut().insert(
            header::SET_COOKIE,
            HeaderValue::from_str(&clear_session_cookie(&config)).unwrap(),
        );
        renew_cookie(&mut response, "abc", &config);

        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].to_str().unwrap().contains("Max-Age=0"));
    }
}
