//! User administration (admin only).

use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::user::{CreateUserRequest, User};
use crate::services::auth_service::{generate_salt, hash_password};
use crate::validation;

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

pub async fn create_user(pool: &DbPool, request: CreateUserRequest) -> Result<User, AppError> {
    validation::username(&request.username)?;
    validation::password(&request.password)?;
    if let Some(email) = &request.email {
        validation::email("email", email)?;
    }
    if let Some(name) = &request.display_name {
        validation::require_text("display_name", name, 128)?;
    }

    let salt = generate_salt();
    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, display_name, email, password_hash, password_salt, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(&request.username)
    .bind(request.display_name.as_deref().map(str::trim))
    .bind(request.email.as_deref().map(str::trim))
    .bind(hash_password(&request.password, &salt))
    .bind(&salt)
    .bind(request.role.as_str())
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => {
            tracing::info!(user_id = %user.id, role = %user.role, "user created");
            Ok(user)
        }
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => Err(
            AppError::Conflict(format!("Username {} is already taken", request.username)),
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE deleted_at IS NULL ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Soft delete a user and revoke every session they hold.
pub async fn soft_delete_user(
    pool: &DbPool,
    acting_user_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    if acting_user_id == user_id {
        return Err(AppError::Validation(
            "Administrators cannot delete themselves".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound("User"));
    }

    let revoked = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    tracing::info!(%user_id, revoked_sessions = revoked, "user soft-deleted");
    Ok(())
}

/// Customer with a unique username, for database-backed tests.
#[cfg(test)]
pub(crate) async fn create_test_customer(pool: &DbPool, password: &str) -> User {
    let suffix = Uuid::new_v4().simple().to_string();
    create_user(
        pool,
        CreateUserRequest {
            username: format!("cust_{}", &suffix[..16]),
            password: password.to_string(),
            display_name: None,
            email: None,
            role: crate::models::user::UserRole::Customer,
        },
    )
    .await
    .expect("customer created")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_database;
    use crate::services::auth_service;

    #[tokio::test]
    async fn display_name_is_stored_trimmed() {
        let Some(pool) = test_database("display_name_is_stored_trimmed").await else {
            return;
        };
        let suffix = Uuid::new_v4().simple().to_string();
        let padded = format!("Ops Desk{}", " ".repeat(200));

        let user = create_user(
            &pool,
            CreateUserRequest {
                username: format!("ops_{}", &suffix[..16]),
                password: "long enough".to_string(),
                display_name: Some(padded),
                email: Some(" ops@agency.test ".to_string()),
                role: crate::models::user::UserRole::Customer,
            },
        )
        .await
        .unwrap();

        assert_eq!(user.display_name.as_deref(), Some("Ops Desk"));
        assert_eq!(user.email.as_deref(), Some("ops@agency.test"));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let Some(pool) = test_database("duplicate_username_is_a_conflict").await else {
            return;
        };
        let user = create_test_customer(&pool, "long enough").await;

        let err = create_user(
            &pool,
            CreateUserRequest {
                username: user.username.clone(),
                password: "another one".to_string(),
                display_name: None,
                email: None,
                role: crate::models::user::UserRole::Customer,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn soft_delete_revokes_sessions_and_blocks_login() {
        let Some(pool) = test_database("soft_delete_revokes_sessions_and_blocks_login").await else {
            return;
        };
        let config = crate::config::test_config("http://127.0.0.1:9");
        let user = create_test_customer(&pool, "long enough").await;
        let (token, _, _) = auth_service::login(&pool, &config, &user.username, "long enough")
            .await
            .unwrap();

        soft_delete_user(&pool, Uuid::new_v4(), user.id).await.unwrap();

        assert!(matches!(
            auth_service::authenticate_token(&pool, &token).await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            auth_service::login(&pool, &config, &user.username, "long enough").await,
            Err(AppError::Unauthorized)
        ));
        assert!(list_users(&pool).await.unwrap().iter().all(|u| u.id != user.id));

        // A second delete finds nothing live.
        let err = soft_delete_user(&pool, Uuid::new_v4(), user.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
