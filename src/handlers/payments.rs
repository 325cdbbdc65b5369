//! Payment tracking endpoint.
//!
//! - GET /api/v1/payments - Payment records with their work order status

use axum::{
    Extension, Json,
    extract::State,
};

use crate::{
    db::DbPool,
    error::AppError,
    extract::AppQuery,
    middleware::auth::AuthContext,
    models::business::{PaymentListItem, PaymentQuery},
    response::{ApiResponse, Page},
    services::work_order_service,
};

/// List payments, newest first. Customers only see their own; `status`
/// filters on the work order status.
pub async fn list_payments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<PaymentQuery>,
) -> Result<Json<ApiResponse<Page<PaymentListItem>>>, AppError> {
    let page = work_order_service::list_payments(&pool, &auth, &query).await?;

    Ok(Json(ApiResponse::success(page)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::test_auth;
    use crate::models::user::UserRole;
    use crate::response::send_empty;
    use crate::state::test_state;
    use axum::{Router, http::StatusCode, routing::get};

    #[tokio::test]
    async fn unknown_status_filter_is_a_validation_error() {
        let router = Router::new()
            .route("/api/v1/payments", get(list_payments))
            .layer(Extension(test_auth(UserRole::Customer)))
            .with_state(test_state());

        let (status, body) = send_empty(router, "GET", "/api/v1/payments?status=PAID").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
