//! Work order data models and lifecycle rules.
//!
//! A work order tracks one unit of account-management business: it is
//! classified by type and subtype, carries the locally generated task number
//! sent to the ad-platform gateway, and the task id the gateway hands back.
//!
//! # Status Lifecycle
//!
//! ```text
//!            draft                 gateway code "0"
//!   (new) ─────────> INIT ──────────────────────────> PENDING ──> PROCESSING
//!     │                │                                 │  ▲          │
//!     │ gateway code   │ cancel                 returned │  │ resubmit │
//!     │ != "0"         ▼                                 ▼  │          ▼
//!     └──────────> FAILED     CANCELLED <───────────── RETURNED    COMPLETED
//! ```
//!
//! Only `INIT`, `PENDING` and `RETURNED` orders may be edited or cancelled
//! by their owner. Everything else is frozen.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::response::Pagination;

/// Gateway response code that means "accepted".
pub const THIRD_PARTY_SUCCESS_CODE: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Init,
    Pending,
    Processing,
    Returned,
    Completed,
    Failed,
    Cancelled,
}

impl WorkOrderStatus {
    /// Statuses in which the owner may still edit or cancel the order.
    pub const MODIFIABLE: [WorkOrderStatus; 3] = [
        WorkOrderStatus::Init,
        WorkOrderStatus::Pending,
        WorkOrderStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Init => "INIT",
            WorkOrderStatus::Pending => "PENDING",
            WorkOrderStatus::Processing => "PROCESSING",
            WorkOrderStatus::Returned => "RETURNED",
            WorkOrderStatus::Completed => "COMPLETED",
            WorkOrderStatus::Failed => "FAILED",
            WorkOrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_modifiable(self) -> bool {
        Self::MODIFIABLE.contains(&self)
    }

    /// Status a work order takes after the gateway answered with `code`.
    pub fn from_third_party_code(code: &str) -> Self {
        if code == THIRD_PARTY_SUCCESS_CODE {
            WorkOrderStatus::Pending
        } else {
            WorkOrderStatus::Failed
        }
    }

    /// Transitions an operator may apply by hand. PENDING is only reachable
    /// from an order the gateway has already accepted; a draft gets there by
    /// being submitted.
    pub fn can_transition_to(self, next: WorkOrderStatus) -> bool {
        use WorkOrderStatus::*;
        matches!(
            (self, next),
            (Init, Cancelled)
                | (Pending, Processing | Returned | Completed | Failed | Cancelled)
                | (Processing, Returned | Completed | Failed)
                | (Returned, Pending | Cancelled)
        )
    }

    /// Fails with `INVALID_STATUS` unless the owner may still change the order.
    pub fn ensure_modifiable(self) -> Result<(), AppError> {
        if self.is_modifiable() {
            Ok(())
        } else {
            Err(AppError::InvalidStatus(format!(
                "Work order in status {self} can no longer be modified"
            )))
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "INIT" => WorkOrderStatus::Init,
            "PENDING" => WorkOrderStatus::Pending,
            "PROCESSING" => WorkOrderStatus::Processing,
            "RETURNED" => WorkOrderStatus::Returned,
            "COMPLETED" => WorkOrderStatus::Completed,
            "FAILED" => WorkOrderStatus::Failed,
            "CANCELLED" => WorkOrderStatus::Cancelled,
            other => return Err(format!("unknown work order status {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderType {
    AccountApplication,
    AccountManagement,
    Payment,
}

impl WorkOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderType::AccountApplication => "ACCOUNT_APPLICATION",
            WorkOrderType::AccountManagement => "ACCOUNT_MANAGEMENT",
            WorkOrderType::Payment => "PAYMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderSubtype {
    GoogleAccount,
    TiktokAccount,
    FacebookAccount,
    Deposit,
    Withdrawal,
    Transfer,
    Bind,
    Unbind,
    Attachment,
    Payment,
}

impl WorkOrderSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderSubtype::GoogleAccount => "GOOGLE_ACCOUNT",
            WorkOrderSubtype::TiktokAccount => "TIKTOK_ACCOUNT",
            WorkOrderSubtype::FacebookAccount => "FACEBOOK_ACCOUNT",
            WorkOrderSubtype::Deposit => "DEPOSIT",
            WorkOrderSubtype::Withdrawal => "WITHDRAWAL",
            WorkOrderSubtype::Transfer => "TRANSFER",
            WorkOrderSubtype::Bind => "BIND",
            WorkOrderSubtype::Unbind => "UNBIND",
            WorkOrderSubtype::Attachment => "ATTACHMENT",
            WorkOrderSubtype::Payment => "PAYMENT",
        }
    }

    pub fn work_order_type(&self) -> WorkOrderType {
        match self {
            WorkOrderSubtype::GoogleAccount
            | WorkOrderSubtype::TiktokAccount
            | WorkOrderSubtype::FacebookAccount => WorkOrderType::AccountApplication,
            WorkOrderSubtype::Deposit
            | WorkOrderSubtype::Withdrawal
            | WorkOrderSubtype::Transfer
            | WorkOrderSubtype::Bind
            | WorkOrderSubtype::Unbind
            | WorkOrderSubtype::Attachment => WorkOrderType::AccountManagement,
            WorkOrderSubtype::Payment => WorkOrderType::Payment,
        }
    }
}

impl fmt::Display for WorkOrderSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderSubtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GOOGLE_ACCOUNT" => WorkOrderSubtype::GoogleAccount,
            "TIKTOK_ACCOUNT" => WorkOrderSubtype::TiktokAccount,
            "FACEBOOK_ACCOUNT" => WorkOrderSubtype::FacebookAccount,
            "DEPOSIT" => WorkOrderSubtype::Deposit,
            "WITHDRAWAL" => WorkOrderSubtype::Withdrawal,
            "TRANSFER" => WorkOrderSubtype::Transfer,
            "BIND" => WorkOrderSubtype::Bind,
            "UNBIND" => WorkOrderSubtype::Unbind,
            "ATTACHMENT" => WorkOrderSubtype::Attachment,
            "PAYMENT" => WorkOrderSubtype::Payment,
            other => return Err(format!("unknown work order subtype {other}")),
        })
    }
}

/// Represents a work order record from the database.
///
/// Enumerations are stored as TEXT; use [`WorkOrder::status`] and
/// [`WorkOrder::subtype`] to get the typed values.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Identifier assigned by the gateway, once it accepted the order.
    pub task_id: Option<String>,
    /// Locally generated identifier sent to the gateway.
    pub task_number: String,
    pub work_order_type: String,
    pub subtype: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn status(&self) -> Result<WorkOrderStatus, AppError> {
        self.status.parse().map_err(AppError::Internal)
    }

    pub fn subtype(&self) -> Result<WorkOrderSubtype, AppError> {
        self.subtype.parse().map_err(AppError::Internal)
    }
}

/// Audit record: the latest request sent to and response received from the gateway.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct RawData {
    pub work_order_id: Uuid,
    pub request: serde_json::Value,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response body for work order endpoints.
#[derive(Debug, Serialize)]
pub struct WorkOrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Option<String>,
    pub task_number: String,
    #[serde(rename = "type")]
    pub work_order_type: String,
    pub subtype: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkOrder> for WorkOrderResponse {
    fn from(order: WorkOrder) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            task_id: order.task_id,
            task_number: order.task_number,
            work_order_type: order.work_order_type,
            subtype: order.subtype,
            status: order.status,
            metadata: order.metadata,
            remark: order.remark,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Work order plus its subtype-specific business data.
#[derive(Debug, Serialize)]
pub struct WorkOrderDetail {
    #[serde(flatten)]
    pub work_order: WorkOrderResponse,
    pub business_data: Option<serde_json::Value>,
}

/// Query string for `GET /api/v1/work-orders`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkOrderQuery {
    #[serde(rename = "type")]
    pub work_order_type: Option<WorkOrderType>,
    pub subtype: Option<WorkOrderSubtype>,
    pub status: Option<WorkOrderStatus>,
    pub task_number: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl WorkOrderQuery {
    pub fn pagination(&self) -> Result<Pagination, AppError> {
        Pagination::new(self.page, self.page_size)
    }
}

/// Body of `PATCH /api/v1/admin/work-orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: WorkOrderStatus,
    pub remark: Option<String>,
}

/// Build a task number: `WO` + UTC timestamp to the second + six random digits.
///
/// The column is UNIQUE, so a collision surfaces as a database error rather
/// than two orders sharing a number.
pub fn generate_task_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::random_range(0..1_000_000);
    format!("WO{}{:06}", now.format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn gateway_success_code_means_pending() {
        assert_eq!(
            WorkOrderStatus::from_third_party_code("0"),
            WorkOrderStatus::Pending
        );
        for code in ["1", "500", "-1", "", "00", "SUCCESS"] {
            assert_eq!(
                WorkOrderStatus::from_third_party_code(code),
                WorkOrderStatus::Failed,
                "code {code:?}"
            );
        }
    }

    #[test]
    fn only_init_pending_returned_are_modifiable() {
        use WorkOrderStatus::*;
        for status in [Init, Pending, Returned] {
            assert!(status.ensure_modifiable().is_ok());
        }
        for status in [Processing, Completed, Failed, Cancelled] {
            let err = status.ensure_modifiable().unwrap_err();
            assert_eq!(err.code(), "INVALID_STATUS");
        }
    }

    #[test]
    fn terminal_statuses_have_no_transitions() {
        use WorkOrderStatus::*;
        let all = [Init, Pending, Processing, Returned, Completed, Failed, Cancelled];
        for from in [Completed, Failed, Cancelled] {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn operator_transitions() {
        use WorkOrderStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Returned.can_transition_to(Pending));
        assert!(!Init.can_transition_to(Completed));
        assert!(!Init.can_transition_to(Pending));
        assert!(Init.can_transition_to(Cancelled));
        assert!(!Processing.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn subtypes_belong_to_types() {
        assert_eq!(
            WorkOrderSubtype::TiktokAccount.work_order_type(),
            WorkOrderType::AccountApplication
        );
        assert_eq!(
            WorkOrderSubtype::Unbind.work_order_type(),
            WorkOrderType::AccountManagement
        );
        assert_eq!(
            WorkOrderSubtype::Payment.work_order_type(),
            WorkOrderType::Payment
        );
        assert_eq!(
            "FACEBOOK_ACCOUNT".parse::<WorkOrderSubtype>(),
            Ok(WorkOrderSubtype::FacebookAccount)
        );
    }

    #[test]
    fn task_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let number = generate_task_number(now);
        assert!(number.starts_with("WO20250304050607"), "{number}");
        assert_eq!(number.len(), 2 + 14 + 6);
        assert!(number[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn pagination_rejects_overflowing_pages() {
        let query = WorkOrderQuery {
            page: Some(i64::MAX),
            page_size: Some(100),
            ..Default::default()
        };
        assert_eq!(query.pagination().unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(WorkOrderQuery::default().pagination().unwrap().offset, 0);
    }

    #[test]
    fn query_parses_screaming_case_filters() {
        let query: WorkOrderQuery =
            serde_json::from_str(r#"{"type":"PAYMENT","status":"RETURNED"}"#).unwrap();
        assert_eq!(query.work_order_type, Some(WorkOrderType::Payment));
        assert_eq!(query.status, Some(WorkOrderStatus::Returned));
    }
}
