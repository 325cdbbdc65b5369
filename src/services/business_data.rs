//! Persistence of subtype-specific business data.
//!
//! Writes take a `PgConnection` so they run inside the caller's transaction,
//! next to the work order row and its raw data.

use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::business::{
    AccountApplication, AccountApplicationData, AccountBindingData, AccountFundsData,
    AccountTransferData, AccountUnbindingData, AttachmentRecord, BusinessPayload, PaymentRecord,
    Platform,
};
use crate::models::work_order::WorkOrderSubtype;

/// Table holding business data for `subtype`.
fn table_for(subtype: WorkOrderSubtype) -> &'static str {
    match subtype {
        WorkOrderSubtype::GoogleAccount
        | WorkOrderSubtype::TiktokAccount
        | WorkOrderSubtype::FacebookAccount => "account_application_data",
        WorkOrderSubtype::Deposit => "account_deposit_data",
        WorkOrderSubtype::Withdrawal => "account_withdrawal_data",
        WorkOrderSubtype::Transfer => "account_transfer_data",
        WorkOrderSubtype::Bind => "account_binding_data",
        WorkOrderSubtype::Unbind => "account_unbinding_data",
        WorkOrderSubtype::Attachment => "attachment_records",
        WorkOrderSubtype::Payment => "payment_records",
    }
}

async fn insert_application(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    platform: Platform,
    a: &AccountApplication,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO account_application_data (
            work_order_id, platform, company_info_id, account_name,
            timezone, currency, promotion_link
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(work_order_id)
    .bind(platform.as_str())
    .bind(a.company_info_id)
    .bind(a.account_name.trim())
    .bind(a.timezone.trim())
    .bind(&a.currency)
    .bind(&a.promotion_link)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    payload: &BusinessPayload,
) -> Result<(), AppError> {
    match payload {
        BusinessPayload::GoogleAccount(a) => {
            insert_application(conn, work_order_id, Platform::Google, a).await?
        }
        BusinessPayload::TiktokAccount(a) => {
            insert_application(conn, work_order_id, Platform::Tiktok, a).await?
        }
        BusinessPayload::FacebookAccount(a) => {
            insert_application(conn, work_order_id, Platform::Facebook, a).await?
        }
        BusinessPayload::Deposit(f) | BusinessPayload::Withdrawal(f) => {
            let sql = format!(
                "INSERT INTO {} (work_order_id, media_account_id, amount_cents, currency) VALUES ($1, $2, $3, $4)",
                table_for(payload.subtype())
            );
            sqlx::query(&sql)
                .bind(work_order_id)
                .bind(f.media_account_id.trim())
                .bind(f.amount_cents)
                .bind(&f.currency)
                .execute(&mut *conn)
                .await?;
        }
        BusinessPayload::Transfer(t) => {
            sqlx::query(
                r#"
                INSERT INTO account_transfer_data (
                    work_order_id, from_media_account_id, to_media_account_id, amount_cents, currency
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(work_order_id)
            .bind(t.from_media_account_id.trim())
            .bind(t.to_media_account_id.trim())
            .bind(t.amount_cents)
            .bind(&t.currency)
            .execute(&mut *conn)
            .await?;
        }
        BusinessPayload::Bind(b) => {
            sqlx::query(
                r#"
                INSERT INTO account_binding_data (work_order_id, media_account_id, binding_type, binding_value)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(work_order_id)
            .bind(b.media_account_id.trim())
            .bind(b.binding_type.as_str())
            .bind(b.binding_value.trim())
            .execute(&mut *conn)
            .await?;
        }
        BusinessPayload::Unbind(u) => {
            sqlx::query(
                r#"
                INSERT INTO account_unbinding_data (work_order_id, media_account_id, binding_type, unbinding_value)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(work_order_id)
            .bind(u.media_account_id.trim())
            .bind(u.binding_type.as_str())
            .bind(u.unbinding_value.trim())
            .execute(&mut *conn)
            .await?;
        }
        BusinessPayload::Attachment(s) => {
            for (position, file) in s.attachments.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO attachment_records (
                        work_order_id, media_account_id, file_name, file_url, mime_type,
                        file_size, position
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(work_order_id)
                .bind(s.media_account_id.trim())
                .bind(file.file_name.trim())
                .bind(&file.file_url)
                .bind(&file.mime_type)
                .bind(file.file_size)
                .bind(position as i32)
                .execute(&mut *conn)
                .await?;
            }
        }
        BusinessPayload::Payment(p) => {
            sqlx::query(
                r#"
                INSERT INTO payment_records (
                    work_order_id, amount_cents, currency, payment_method,
                    payment_reference, payer_name, paid_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(work_order_id)
            .bind(p.amount_cents)
            .bind(&p.currency)
            .bind(p.payment_method.as_str())
            .bind(p.payment_reference.trim())
            .bind(p.payer_name.trim())
            .bind(p.paid_at)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

/// Replace the business data of an existing work order.
pub async fn replace(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    payload: &BusinessPayload,
) -> Result<(), AppError> {
    let sql = format!(
        "DELETE FROM {} WHERE work_order_id = $1",
        table_for(payload.subtype())
    );
    sqlx::query(&sql)
        .bind(work_order_id)
        .execute(&mut *conn)
        .await?;

    insert(conn, work_order_id, payload).await
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

/// Business data of a work order as JSON, or `None` if nothing was stored.
pub async fn load(
    conn: &mut PgConnection,
    work_order_id: Uuid,
    subtype: WorkOrderSubtype,
) -> Result<Option<Value>, AppError> {
    let table = table_for(subtype);
    let sql = format!("SELECT * FROM {table} WHERE work_order_id = $1");

    let value = match subtype {
        WorkOrderSubtype::GoogleAccount
        | WorkOrderSubtype::TiktokAccount
        | WorkOrderSubtype::FacebookAccount => sqlx::query_as::<_, AccountApplicationData>(&sql)
            .bind(work_order_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(to_json)
            .transpose()?,
        WorkOrderSubtype::Deposit | WorkOrderSubtype::Withdrawal => {
            sqlx::query_as::<_, AccountFundsData>(&sql)
                .bind(work_order_id)
                .fetch_optional(&mut *conn)
                .await?
                .map(to_json)
                .transpose()?
        }
        WorkOrderSubtype::Transfer => sqlx::query_as::<_, AccountTransferData>(&sql)
            .bind(work_order_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(to_json)
            .transpose()?,
        WorkOrderSubtype::Bind => sqlx::query_as::<_, AccountBindingData>(&sql)
            .bind(work_order_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(to_json)
            .transpose()?,
        WorkOrderSubtype::Unbind => sqlx::query_as::<_, AccountUnbindingData>(&sql)
            .bind(work_order_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(to_json)
            .transpose()?,
        WorkOrderSubtype::Attachment => {
            let records = sqlx::query_as::<_, AttachmentRecord>(&format!("{sql} ORDER BY position"))
                .bind(work_order_id)
                .fetch_all(&mut *conn)
                .await?;
            if records.is_empty() {
                None
            } else {
                Some(to_json(records)?)
            }
        }
        WorkOrderSubtype::Payment => sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(work_order_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(to_json)
            .transpose()?,
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_subtypes_share_a_table() {
        assert_eq!(
            table_for(WorkOrderSubtype::GoogleAccount),
            table_for(WorkOrderSubtype::FacebookAccount)
        );
        assert_ne!(
            table_for(WorkOrderSubtype::Deposit),
            table_for(WorkOrderSubtype::Withdrawal)
        );
    }

    #[tokio::test]
    async fn attachments_load_in_submission_order_with_trimmed_names() {
        let Some(pool) =
            crate::db::test_database("attachments_load_in_submission_order_with_trimmed_names")
                .await
        else {
            return;
        };
        let user = crate::services::user_service::create_test_customer(&pool, "long enough").await;
        let auth = crate::middleware::auth::AuthContext {
            user_id: user.id,
            username: user.username.clone(),
            role: crate::models::user::UserRole::Customer,
            session_id: Uuid::new_v4(),
        };
        let (gateway, _) = crate::services::third_party::mock_gateway("0").await;

        let files: Vec<Value> = [format!("z{}", " ".repeat(300)), "b.png".into(), "a.pdf".into()]
            .into_iter()
            .map(|name| {
                serde_json::json!({
                    "file_name": name,
                    "file_url": "https://files.example.com/x",
                    "mime_type": "image/png",
                    "file_size": 10
                })
            })
            .collect();
        let request = serde_json::from_value(serde_json::json!({
            "subtype": "ATTACHMENT",
            "media_account_id": "123-456-7890",
            "attachments": files,
            "draft": true
        }))
        .unwrap();

        let order = crate::services::work_order_service::submit(&pool, &gateway, &auth, request)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let loaded = load(&mut *conn, order.id, WorkOrderSubtype::Attachment)
            .await
            .unwrap()
            .unwrap();
        let names: Vec<_> = loaded
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["file_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["z", "b.png", "a.pdf"]);
        assert_eq!(loaded[2]["position"], 2);
    }
}
