//! User and session models.
//!
//! Users are operators (`ADMIN`) or end customers (`CUSTOMER`) of the agency.
//! Passwords are stored as salted HMAC-SHA256 digests and session tokens as
//! SHA-256 hashes, so neither secret is recoverable from the database.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role stored in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Customer => "CUSTOMER",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "CUSTOMER" => Ok(UserRole::Customer),
            other => Err(format!("unknown role {other}")),
        }
    }
}

/// Represents a user record from the database.
///
/// # Soft Delete
///
/// Deleting a user only sets `deleted_at`. Deleted users keep their work
/// orders for auditing but can no longer log in, and every query that
/// authenticates a request filters them out.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub password_salt: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Soft-deleted users are locked out regardless of password.
    pub fn can_authenticate(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Parsed role. Unknown values fall back to the least privileged role.
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Customer)
    }
}

/// Session row. The raw token only ever exists in the client's cookie or header.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Request body for `POST /api/v1/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /api/v1/users`.
///
/// # JSON Example
///
/// ```json
/// {
///   "username": "acme_ops",
///   "password": "s3cret-pass",
///   "display_name": "Acme Operations",
///   "email": "ops@acme.test",
///   "role": "CUSTOMER"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::Customer
}

/// Public view of a user; never includes password material.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Returned by login and refresh. The token is also set as a cookie.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(deleted_at: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "acme".to_string(),
            display_name: None,
            email: None,
            password_hash: String::new(),
            password_salt: String::new(),
            role: "CUSTOMER".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at,
        }
    }

    #[test]
    fn soft_deleted_user_cannot_authenticate() {
        assert!(user(None).can_authenticate());
        assert!(!user(Some(Utc::now())).can_authenticate());
    }

    #[test]
    fn unknown_role_is_not_admin() {
        let mut u = user(None);
        u.role = "SUPERUSER".to_string();
        assert_eq!(u.role(), UserRole::Customer);
        u.role = "ADMIN".to_string();
        assert_eq!(u.role(), UserRole::Admin);
    }

    #[test]
    fn create_user_defaults_to_customer() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username":"acme","password":"12345678"}"#).unwrap();
        assert_eq!(req.role, UserRole::Customer);
    }
}
