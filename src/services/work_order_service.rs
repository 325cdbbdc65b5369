//! Work order lifecycle - submission, resubmission, cancellation and review.
//!
//! Every gateway-backed operation follows the same template:
//!
//! 1. Validate the request (shape, ownership, current status)
//! 2. Call the ad-platform gateway
//! 3. In one database transaction, write the work order row, its raw data
//!    and its business data
//! 4. Set the status from the gateway code (`"0"` -> PENDING, else FAILED)
//!
//! The gateway call happens outside the transaction so no connection is held
//! while waiting on the network. Updates re-check the status under
//! `SELECT ... FOR UPDATE` before writing.

use chrono::Utc;
use serde_json::{Value, json};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::business::{BusinessPayload, PaymentListItem, PaymentQuery, WorkOrderRequest};
use crate::models::work_order::{
    RawData, StatusUpdateRequest, WorkOrder, WorkOrderDetail, WorkOrderQuery, WorkOrderResponse,
    WorkOrderStatus, generate_task_number,
};
use crate::response::{Page, Pagination};
use crate::services::third_party::{GatewayExchange, ThirdPartyClient, submit_path, update_path};
use crate::services::{business_data, company_service};

/// Body sent to the gateway for a submission or resubmission.
fn gateway_body(
    task_number: &str,
    task_id: Option<&str>,
    request: &WorkOrderRequest,
) -> Result<Value, AppError> {
    let subtype = request.payload.subtype();
    let business = serde_json::to_value(&request.payload)
        .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {}", e)))?;

    Ok(json!({
        "taskNumber": task_number,
        "taskId": task_id,
        "type": subtype.work_order_type().as_str(),
        "subtype": subtype.as_str(),
        "remark": request.remark,
        "businessData": business,
    }))
}

/// Account applications must reference a company the caller may see.
async fn check_references(
    conn: &mut PgConnection,
    auth: &AuthContext,
    payload: &BusinessPayload,
) -> Result<(), AppError> {
    if let Some((_, application)) = payload.application() {
        company_service::find_company(conn, auth, application.company_info_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::Validation("company_info_id does not reference your company".to_string())
                }
                other => other,
            })?;
    }
    Ok(())
}

/// Upsert the raw data row with the latest exchange.
async fn save_raw_data(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    path: &str,
    exchange: &GatewayExchange,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO raw_data (work_order_id, request, response)
        VALUES ($1, $2, $3)
        ON CONFLICT (work_order_id) DO UPDATE
        SET request = EXCLUDED.request,
            response = EXCLUDED.response,
            updated_at = NOW()
        "#,
    )
    .bind(work_order_id)
    .bind(exchange.audit_request(path))
    .bind(&exchange.response)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load a work order visible to the caller, optionally locking the row.
async fn find_work_order(
    conn: &mut PgConnection,
    auth: &AuthContext,
    work_order_id: Uuid,
    for_update: bool,
) -> Result<WorkOrder, AppError> {
    let sql = if for_update {
        "SELECT * FROM work_orders WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2) FOR UPDATE"
    } else {
        "SELECT * FROM work_orders WHERE id = $1 AND ($2::uuid IS NULL OR user_id = $2)"
    };

    sqlx::query_as::<_, WorkOrder>(sql)
        .bind(work_order_id)
        .bind(auth.owner_filter())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Work order"))
}

/// Outcome of a gateway-backed write: the stored order, or a rejection that
/// still carries it.
fn finish(order: WorkOrder, exchange: &GatewayExchange) -> Result<WorkOrder, AppError> {
    if exchange.accepted() {
        return Ok(order);
    }

    let message = if exchange.message.is_empty() {
        format!("Third-party service rejected the request (code {})", exchange.code)
    } else {
        exchange.message.clone()
    };
    let data = serde_json::to_value(WorkOrderResponse::from(order)).ok();

    Err(AppError::ThirdPartyRejected { message, data })
}

/// Create a work order.
///
/// Drafts are stored as `INIT` without contacting the gateway. Otherwise the
/// gateway is called first and the order is stored as PENDING or FAILED
/// according to its answer; a FAILED order is still persisted and returned
/// inside the `THIRD_PARTY_ERROR` response.
///
/// # Errors
///
/// - `Validation`: bad payload, or a company that is not the caller's
/// - `ThirdPartyUnavailable`: gateway unreachable; nothing is stored
/// - `ThirdPartyRejected`: gateway answered a non-zero code
pub async fn submit(
    pool: &DbPool,
    gateway: &ThirdPartyClient,
    auth: &AuthContext,
    request: WorkOrderRequest,
) -> Result<WorkOrder, AppError> {
    let now = Utc::now();
    request.validate(now)?;

    {
        let mut conn = pool.acquire().await?;
        check_references(&mut *conn, auth, &request.payload).await?;
    }

    let subtype = request.payload.subtype();
    let task_number = generate_task_number(now);
    let metadata = request.metadata.clone().unwrap_or_else(|| json!({}));

    let exchange = if request.draft {
        None
    } else {
        let path = submit_path(subtype);
        let body = gateway_body(&task_number, None, &request)?;
        Some((path, gateway.call(path, body).await?))
    };

    let status = exchange
        .as_ref()
        .map_or(WorkOrderStatus::Init, |(_, e)| e.status());
    let task_id = exchange.as_ref().and_then(|(_, e)| e.task_id.clone());

    let mut tx = pool.begin().await?;

    let order = sqlx::query_as::<_, WorkOrder>(
        r#"
        INSERT INTO work_orders (
            user_id, task_id, task_number, work_order_type, subtype, status, metadata, remark
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(&task_id)
    .bind(&task_number)
    .bind(subtype.work_order_type().as_str())
    .bind(subtype.as_str())
    .bind(status.as_str())
    .bind(&metadata)
    .bind(&request.remark)
    .fetch_one(&mut *tx)
    .await?;

    if let Some((path, exchange)) = &exchange {
        save_raw_data(&mut *tx, order.id, path, exchange).await?;
    }
    business_data::insert(&mut *tx, order.id, &request.payload).await?;

    tx.commit().await?;

    tracing::info!(
        work_order_id = %order.id,
        task_number = %order.task_number,
        subtype = %subtype,
        status = %status,
        "work order created"
    );

    match &exchange {
        Some((_, exchange)) => finish(order, exchange),
        None => Ok(order),
    }
}

/// Edit and resubmit a work order that is still INIT, PENDING or RETURNED.
///
/// With `draft = true` only INIT orders can be edited, and nothing is sent
/// to the gateway. Otherwise the raw data and business data are replaced
/// and the status follows the gateway code again.
pub async fn update(
    pool: &DbPool,
    gateway: &ThirdPartyClient,
    auth: &AuthContext,
    work_order_id: Uuid,
    request: WorkOrderRequest,
) -> Result<WorkOrder, AppError> {
    request.validate(Utc::now())?;

    let current = {
        let mut conn = pool.acquire().await?;
        let current = find_work_order(&mut *conn, auth, work_order_id, false).await?;
        if current.subtype()? != request.payload.subtype() {
            return Err(AppError::Validation(format!(
                "Work order is {} and cannot be updated with {} data",
                current.subtype,
                request.payload.subtype()
            )));
        }
        current.status()?.ensure_modifiable()?;
        check_references(&mut *conn, auth, &request.payload).await?;
        current
    };

    let subtype = request.payload.subtype();
    let exchange = if request.draft {
        None
    } else {
        // Orders never accepted by the gateway have no task there yet.
        let path = match current.task_id {
            Some(_) => update_path(subtype),
            None => submit_path(subtype).to_string(),
        };
        let body = gateway_body(&current.task_number, current.task_id.as_deref(), &request)?;
        let exchange = gateway.call(&path, body).await?;
        Some((path, exchange))
    };

    let mut tx = pool.begin().await?;

    let locked = find_work_order(&mut *tx, auth, work_order_id, true).await?;
    let previous = locked.status()?;
    if let Err(e) = previous.ensure_modifiable() {
        tracing::warn!(
            %work_order_id,
            status = %previous,
            "status changed while the gateway call was in flight"
        );
        return Err(e);
    }
    // Drafts never reach the gateway, so they may only overwrite an order
    // the gateway has not seen either.
    if request.draft && previous != WorkOrderStatus::Init {
        return Err(AppError::InvalidStatus(
            "Only INIT work orders can be saved as a draft".to_string(),
        ));
    }

    let status = exchange.as_ref().map_or(previous, |(_, e)| e.status());
    let task_id = exchange.as_ref().and_then(|(_, e)| e.task_id.clone());

    let order = sqlx::query_as::<_, WorkOrder>(
        r#"
        UPDATE work_orders
        SET status = $1,
            task_id = COALESCE($2, task_id),
            metadata = COALESCE($3, metadata),
            remark = COALESCE($4, remark),
            updated_at = NOW()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(status.as_str())
    .bind(&task_id)
    .bind(&request.metadata)
    .bind(&request.remark)
    .bind(work_order_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some((path, exchange)) = &exchange {
        save_raw_data(&mut *tx, order.id, path, exchange).await?;
    }
    business_data::replace(&mut *tx, order.id, &request.payload).await?;

    tx.commit().await?;

    tracing::info!(
        %work_order_id,
        from = %previous,
        to = %status,
        "work order updated"
    );

    match &exchange {
        Some((_, exchange)) => finish(order, exchange),
        None => Ok(order),
    }
}

/// Owner cancels a work order that is still INIT, PENDING or RETURNED.
pub async fn cancel(
    pool: &DbPool,
    auth: &AuthContext,
    work_order_id: Uuid,
) -> Result<WorkOrder, AppError> {
    let mut tx = pool.begin().await?;

    let current = find_work_order(&mut *tx, auth, work_order_id, true).await?;
    let previous = current.status()?;
    previous.ensure_modifiable()?;

    let order = sqlx::query_as::<_, WorkOrder>(
        "UPDATE work_orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(WorkOrderStatus::Cancelled.as_str())
    .bind(work_order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(%work_order_id, from = %previous, "work order cancelled");
    Ok(order)
}

/// Operator moves a work order along the review lifecycle.
pub async fn set_status(
    pool: &DbPool,
    auth: &AuthContext,
    work_order_id: Uuid,
    request: StatusUpdateRequest,
) -> Result<WorkOrder, AppError> {
    auth.ensure_admin()?;

    let mut tx = pool.begin().await?;

    let current = find_work_order(&mut *tx, auth, work_order_id, true).await?;
    let previous = current.status()?;
    if !previous.can_transition_to(request.status) {
        return Err(AppError::InvalidStatus(format!(
            "Cannot move work order from {} to {}",
            previous, request.status
        )));
    }

    let order = sqlx::query_as::<_, WorkOrder>(
        r#"
        UPDATE work_orders
        SET status = $1, remark = COALESCE($2, remark), updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(request.status.as_str())
    .bind(&request.remark)
    .bind(work_order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %work_order_id,
        operator = %auth.username,
        from = %previous,
        to = %request.status,
        "work order status changed"
    );
    Ok(order)
}

pub async fn list(
    pool: &DbPool,
    auth: &AuthContext,
    query: &WorkOrderQuery,
) -> Result<Page<WorkOrderResponse>, AppError> {
    let pagination = query.pagination()?;
    let owner = auth.owner_filter();
    let work_order_type = query.work_order_type.map(|t| t.as_str());
    let subtype = query.subtype.map(|s| s.as_str());
    let status = query.status.map(|s| s.as_str());
    let task_number = query.task_number.as_deref();

    const FILTER: &str = r#"
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR work_order_type = $2)
          AND ($3::text IS NULL OR subtype = $3)
          AND ($4::text IS NULL OR status = $4)
          AND ($5::text IS NULL OR task_number = $5)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM work_orders {FILTER}"))
        .bind(owner)
        .bind(work_order_type)
        .bind(subtype)
        .bind(status)
        .bind(task_number)
        .fetch_one(pool)
        .await?;

    let orders = sqlx::query_as::<_, WorkOrder>(&format!(
        "SELECT * FROM work_orders {FILTER} ORDER BY created_at DESC LIMIT $6 OFFSET $7"
    ))
    .bind(owner)
    .bind(work_order_type)
    .bind(subtype)
    .bind(status)
    .bind(task_number)
    .bind(pagination.page_size)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(
        orders.into_iter().map(Into::into).collect(),
        total,
        pagination,
    ))
}

pub async fn get_detail(
    pool: &DbPool,
    auth: &AuthContext,
    work_order_id: Uuid,
) -> Result<WorkOrderDetail, AppError> {
    let mut conn = pool.acquire().await?;
    let order = find_work_order(&mut *conn, auth, work_order_id, false).await?;
    let business = business_data::load(&mut *conn, order.id, order.subtype()?).await?;

    Ok(WorkOrderDetail {
        work_order: order.into(),
        business_data: business,
    })
}

/// Raw gateway exchange of a work order. Drafts have none.
pub async fn get_raw_data(
    pool: &DbPool,
    auth: &AuthContext,
    work_order_id: Uuid,
) -> Result<RawData, AppError> {
    auth.ensure_admin()?;

    sqlx::query_as::<_, RawData>("SELECT * FROM raw_data WHERE work_order_id = $1")
        .bind(work_order_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Raw data"))
}

/// Payment records with the status of their work orders, newest first.
pub async fn list_payments(
    pool: &DbPool,
    auth: &AuthContext,
    query: &PaymentQuery,
) -> Result<Page<PaymentListItem>, AppError> {
    let pagination = Pagination::new(query.page, query.page_size)?;
    let owner = auth.owner_filter();
    let status = query.status.map(|s| s.as_str());

    const FILTER: &str = r#"
        FROM payment_records p
        JOIN work_orders w ON w.id = p.work_order_id
        WHERE ($1::uuid IS NULL OR w.user_id = $1)
          AND ($2::text IS NULL OR w.status = $2)
    "#;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FILTER}"))
        .bind(owner)
        .bind(status)
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, PaymentListItem>(&format!(
        r#"
        SELECT p.work_order_id, w.task_number, w.status, w.user_id,
               p.amount_cents, p.currency, p.payment_method, p.payment_reference,
               p.payer_name, p.paid_at, w.created_at
        {FILTER}
        ORDER BY w.created_at DESC
        LIMIT $3 OFFSET $4
        "#
    ))
    .bind(owner)
    .bind(status)
    .bind(pagination.page_size)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    Ok(Page::new(items, total, pagination))
}
