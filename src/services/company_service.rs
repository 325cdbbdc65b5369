//! Company information owned by customers.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::business::{AttachmentFile, MAX_ATTACHMENTS};
use crate::models::company::{CompanyAttachment, CompanyDetail, CompanyInfo, CreateCompanyRequest};

async fn insert_attachments(
    conn: &mut PgConnection,
    company_info_id: Uuid,
    attachments: &[AttachmentFile],
) -> Result<(), AppError> {
    for (position, file) in attachments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO company_attachments (
                company_info_id, file_name, file_url, mime_type, file_size, position
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(company_info_id)
        .bind(file.file_name.trim())
        .bind(&file.file_url)
        .bind(&file.mime_type)
        .bind(file.file_size)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Company row plus attachments, written in one transaction.
pub async fn create_company(
    pool: &DbPool,
    auth: &AuthContext,
    request: CreateCompanyRequest,
) -> Result<CompanyDetail, AppError> {
    request.validate()?;

    let mut tx = pool.begin().await?;

    let company = sqlx::query_as::<_, CompanyInfo>(
        r#"
        INSERT INTO company_infos (
            user_id, company_name, registration_number, country,
            address, contact_name, contact_email, contact_phone
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(request.company_name.trim())
    .bind(request.registration_number.trim())
    .bind(&request.country)
    .bind(request.address.as_deref().map(str::trim))
    .bind(request.contact_name.trim())
    .bind(request.contact_email.trim())
    .bind(request.contact_phone.as_deref().map(str::trim))
    .fetch_one(&mut *tx)
    .await?;

    insert_attachments(&mut *tx, company.id, &request.attachments).await?;
    tx.commit().await?;

    tracing::info!(company_id = %company.id, user_id = %auth.user_id, "company registered");
    get_company(pool, auth, company.id).await
}

pub async fn list_companies(pool: &DbPool, auth: &AuthContext) -> Result<Vec<CompanyInfo>, AppError> {
    let companies = sqlx::query_as::<_, CompanyInfo>(
        r#"
        SELECT * FROM company_infos
        WHERE ($1::uuid IS NULL OR user_id = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.owner_filter())
    .fetch_all(pool)
    .await?;

    Ok(companies)
}

/// Fetch a company visible to the caller: their own, or any for admins.
pub async fn find_company(
    conn: &mut PgConnection,
    auth: &AuthContext,
    company_id: Uuid,
) -> Result<CompanyInfo, AppError> {
    sqlx::query_as::<_, CompanyInfo>(
        "SELECT * FROM company_infos WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)",
    )
    .bind(company_id)
    .bind(auth.owner_filter())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Company"))
}

pub async fn get_company(
    pool: &DbPool,
    auth: &AuthContext,
    company_id: Uuid,
) -> Result<CompanyDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let company = find_company(&mut *conn, auth, company_id).await?;

    let attachments = sqlx::query_as::<_, CompanyAttachment>(
        "SELECT * FROM company_attachments WHERE company_info_id = $1 ORDER BY created_at, position",
    )
    .bind(company.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(CompanyDetail {
        company,
        attachments,
    })
}

pub async fn add_attachments(
    pool: &DbPool,
    auth: &AuthContext,
    company_id: Uuid,
    attachments: Vec<AttachmentFile>,
) -> Result<CompanyDetail, AppError> {
    if attachments.is_empty() || attachments.len() > MAX_ATTACHMENTS {
        return Err(AppError::Validation(format!(
            "attachments must contain 1 to {MAX_ATTACHMENTS} files"
        )));
    }
    attachments.iter().try_for_each(AttachmentFile::validate)?;

    let mut tx = pool.begin().await?;
    let company = find_company(&mut *tx, auth, company_id).await?;
    insert_attachments(&mut *tx, company.id, &attachments).await?;
    sqlx::query("UPDATE company_infos SET updated_at = NOW() WHERE id = $1")
        .bind(company.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    get_company(pool, auth, company_id).await
}
