//! Company information endpoints.
//!
//! - POST /api/v1/companies - Register a company
//! - GET /api/v1/companies - List companies (own, or all for admins)
//! - GET /api/v1/companies/{id} - Company with attachments
//! - POST /api/v1/companies/{id}/attachments - Add attachments

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
    models::company::{AddCompanyAttachmentsRequest, CompanyDetail, CompanyInfo, CreateCompanyRequest},
    response::ApiResponse,
    services::company_service,
};

/// Register a company. Attachment files must already be uploaded to object
/// storage; only their URLs and metadata are stored here.
pub async fn create_company(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppJson(request): AppJson<CreateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let company = company_service::create_company(&pool, &auth, request).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(company))))
}

pub async fn list_companies(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<CompanyInfo>>>, AppError> {
    let companies = company_service::list_companies(&pool, &auth).await?;

    Ok(Json(ApiResponse::success(companies)))
}

pub async fn get_company(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(company_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<CompanyDetail>>, AppError> {
    let company = company_service::get_company(&pool, &auth, company_id).await?;

    Ok(Json(ApiResponse::success(company)))
}

pub async fn add_attachments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(company_id): AppPath<Uuid>,
    AppJson(request): AppJson<AddCompanyAttachmentsRequest>,
) -> Result<Json<ApiResponse<CompanyDetail>>, AppError> {
    let company =
        company_service::add_attachments(&pool, &auth, company_id, request.attachments).await?;

    Ok(Json(ApiResponse::success(company)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::test_auth;
    use crate::models::user::UserRole;
    use crate::response::send_empty;
    use crate::state::test_state;
    use axum::{
        Router,
        http::StatusCode,
        routing::{get, post},
    };

    #[tokio::test]
    async fn bad_company_ids_are_validation_errors() {
        let router = Router::new()
            .route("/api/v1/companies/{id}", get(get_company))
            .route("/api/v1/companies/{id}/attachments", post(add_attachments))
            .layer(Extension(test_auth(UserRole::Customer)))
            .with_state(test_state());

        for (method, uri) in [
            ("GET", "/api/v1/companies/acme"),
            ("POST", "/api/v1/companies/acme/attachments"),
        ] {
            let (status, body) = send_empty(router.clone(), method, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["code"], "VALIDATION_ERROR", "{method} {uri}");
        }
    }
}
