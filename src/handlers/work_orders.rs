//! Work order HTTP handlers.
//!
//! This module implements the work order API endpoints:
//! - POST /api/v1/work-orders - Create (or save as draft) a work order of any subtype
//! - GET /api/v1/work-orders - List work orders with filters and pagination
//! - GET /api/v1/work-orders/{id} - Work order with business data
//! - PUT /api/v1/work-orders/{id} - Edit and resubmit
//! - POST /api/v1/work-orders/{id}/cancel - Cancel
//! - GET /api/v1/work-orders/{id}/raw-data - Gateway audit record (admin)
//! - PATCH /api/v1/admin/work-orders/{id}/status - Review transition (admin)

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
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::AuthContext,
    models::business::WorkOrderRequest,
    models::work_order::{
        RawData, StatusUpdateRequest, WorkOrderDetail, WorkOrderQuery, WorkOrderResponse,
    },
    response::{ApiResponse, Page},
    services::work_order_service,
    state::AppState,
};

/// Create a work order.
///
/// # Request Body
///
/// A business payload tagged by `subtype`, plus optional `remark`,
/// `metadata` and `draft`:
///
/// ```json
/// {
///   "subtype": "UNBIND",
///   "media_account_id": "123-456-7890",
///   "binding_type": "MCC",
///   "unbinding_value": "987-654-3210",
///   "remark": "agency change"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: status `PENDING` (gateway accepted) or `INIT` (draft)
/// - **422 THIRD_PARTY_ERROR**: gateway rejected; the stored `FAILED` order is in `data`
/// - **502 THIRD_PARTY_ERROR**: gateway unreachable; nothing stored
pub async fn create_work_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(request): AppJson<WorkOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = work_order_service::submit(&state.pool, &state.gateway, &auth, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(WorkOrderResponse::from(order))),
    ))
}

/// List work orders, newest first. Customers only see their own.
///
/// # Query Parameters
///
/// `type`, `subtype`, `status`, `task_number`, `page` (from 1), `page_size` (1-100, default 20)
pub async fn list_work_orders(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<WorkOrderQuery>,
) -> Result<Json<ApiResponse<Page<WorkOrderResponse>>>, AppError> {
    let page = work_order_service::list(&pool, &auth, &query).await?;

    Ok(Json(ApiResponse::success(page)))
}

pub async fn get_work_order(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(work_order_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<WorkOrderDetail>>, AppError> {
    let detail = work_order_service::get_detail(&pool, &auth, work_order_id).await?;

    Ok(Json(ApiResponse::success(detail)))
}

/// Edit and resubmit a work order.
///
/// Only allowed while the order is `INIT`, `PENDING` or `RETURNED`; other
/// statuses answer `409 INVALID_STATUS`. The payload `subtype` must match
/// the stored one.
pub async fn update_work_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(work_order_id): AppPath<Uuid>,
    AppJson(request): AppJson<WorkOrderRequest>,
) -> Result<Json<ApiResponse<WorkOrderResponse>>, AppError> {
    let order =
        work_order_service::update(&state.pool, &state.gateway, &auth, work_order_id, request)
            .await?;

    Ok(Json(ApiResponse::success(order.into())))
}

pub async fn cancel_work_order(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(work_order_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<WorkOrderResponse>>, AppError> {
    let order = work_order_service::cancel(&pool, &auth, work_order_id).await?;

    Ok(Json(ApiResponse::success(order.into())))
}

pub async fn get_raw_data(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(work_order_id): AppPath<Uuid>,
) -> Result<Json<ApiResponse<RawData>>, AppError> {
    let raw = work_order_service::get_raw_data(&pool, &auth, work_order_id).await?;

    Ok(Json(ApiResponse::success(raw)))
}

/// Apply a review transition, e.g. `PENDING -> PROCESSING` or `PROCESSING -> COMPLETED`.
pub async fn update_status(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    AppPath(work_order_id): AppPath<Uuid>,
    AppJson(request): AppJson<StatusUpdateRequest>,
) -> Result<Json<ApiResponse<WorkOrderResponse>>, AppError> {
    let order = work_order_service::set_status(&pool, &auth, work_order_id, request).await?;

    Ok(Json(ApiResponse::success(order.into())))
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
        routing::{get, patch, post},
    };

    fn router() -> Router {
        Router::new()
            .route("/api/v1/work-orders", get(list_work_orders))
            .route(
                "/api/v1/work-orders/{id}",
                get(get_work_order).put(update_work_order),
            )
            .route("/api/v1/work-orders/{id}/cancel", post(cancel_work_order))
            .route("/api/v1/work-orders/{id}/raw-data", get(get_raw_data))
            .route("/api/v1/admin/work-orders/{id}/status", patch(update_status))
            .layer(Extension(test_auth(UserRole::Admin)))
            .with_state(test_state())
    }

    #[tokio::test]
    async fn bad_query_strings_use_the_envelope() {
        for uri in [
            "/api/v1/work-orders?status=BOGUS",
            "/api/v1/work-orders?type=ACCOUNT",
            "/api/v1/work-orders?page=first",
        ] {
            let (status, body) = send_empty(router(), "GET", uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["code"], "VALIDATION_ERROR", "{uri}");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn bad_work_order_ids_use_the_envelope() {
        for (method, uri) in [
            ("GET", "/api/v1/work-orders/not-a-uuid"),
            ("PUT", "/api/v1/work-orders/not-a-uuid"),
            ("POST", "/api/v1/work-orders/not-a-uuid/cancel"),
            ("GET", "/api/v1/work-orders/not-a-uuid/raw-data"),
            ("PATCH", "/api/v1/admin/work-orders/not-a-uuid/status"),
        ] {
            let (status, body) = send_empty(router(), method, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert_eq!(body["code"], "VALIDATION_ERROR", "{method} {uri}");
        }
    }
}
