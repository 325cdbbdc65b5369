//! Business data: the subtype-specific part of a work order.
//!
//! Requests carry a [`BusinessPayload`] tagged by `subtype`. Each variant is
//! validated here, forwarded to the gateway as JSON, and persisted into its
//! own table by `services::business_data`.
//!
//! # JSON Example
//!
//! ```json
//! {
//!   "subtype": "DEPOSIT",
//!   "media_account_id": "123-456-7890",
//!   "amount_cents": 500000,
//!   "currency": "USD",
//!   "remark": "Q3 budget"
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::work_order::WorkOrderSubtype;
use crate::validation;

/// Ad platform an account application targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Google,
    Tiktok,
    Facebook,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Google => "GOOGLE",
            Platform::Tiktok => "TIKTOK",
            Platform::Facebook => "FACEBOOK",
        }
    }
}

/// What an account gets bound to, or unbound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingType {
    /// User access by email address.
    Email,
    /// Google manager (MCC) account id.
    Mcc,
    /// Facebook Business Manager id.
    BusinessManager,
    /// TikTok Business Center id.
    BusinessCenter,
}

impl BindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingType::Email => "EMAIL",
            BindingType::Mcc => "MCC",
            BindingType::BusinessManager => "BUSINESS_MANAGER",
            BindingType::BusinessCenter => "BUSINESS_CENTER",
        }
    }

    fn validate_value(&self, field: &str, value: &str) -> Result<(), AppError> {
        match self {
            BindingType::Email => validation::email(field, value),
            _ => validation::require_text(field, value, 256),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    CreditCard,
    Paypal,
    Usdt,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::Usdt => "USDT",
        }
    }
}

/// New ad account for a company the caller registered beforehand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountApplication {
    pub company_info_id: Uuid,
    pub account_name: String,
    /// IANA zone name, e.g. `Asia/Shanghai`.
    pub timezone: String,
    pub currency: String,
    /// Landing page that will be advertised.
    pub promotion_link: String,
}

/// Deposit to or withdrawal from one media account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFunds {
    pub media_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTransfer {
    pub from_media_account_id: String,
    pub to_media_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBinding {
    pub media_account_id: String,
    pub binding_type: BindingType,
    pub binding_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUnbinding {
    pub media_account_id: String,
    pub binding_type: BindingType,
    pub unbinding_value: String,
}

/// Reference to a file the client already uploaded to object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentFile {
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub file_size: i64,
}

impl AttachmentFile {
    pub fn validate(&self) -> Result<(), AppError> {
        validation::attachment(&self.file_name, &self.file_url, &self.mime_type, self.file_size)
    }
}

pub const MAX_ATTACHMENTS: usize = 10;

/// Documents submitted for a media account (e.g. qualification files).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSubmission {
    pub media_account_id: String,
    pub attachments: Vec<AttachmentFile>,
}

/// Proof of a customer payment to the agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    /// Bank slip number, card authorisation or transaction hash.
    pub payment_reference: String,
    pub payer_name: String,
    pub paid_at: DateTime<Utc>,
}

/// Allowed clock skew for `paid_at`.
const PAID_AT_SKEW_MINUTES: i64 = 5;

/// Subtype-specific request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessPayload {
    GoogleAccount(AccountApplication),
    TiktokAccount(AccountApplication),
    FacebookAccount(AccountApplication),
    Deposit(AccountFunds),
    Withdrawal(AccountFunds),
    Transfer(AccountTransfer),
    Bind(AccountBinding),
    Unbind(AccountUnbinding),
    Attachment(AttachmentSubmission),
    Payment(PaymentDetails),
}

impl BusinessPayload {
    pub fn subtype(&self) -> WorkOrderSubtype {
        match self {
            BusinessPayload::GoogleAccount(_) => WorkOrderSubtype::GoogleAccount,
            BusinessPayload::TiktokAccount(_) => WorkOrderSubtype::TiktokAccount,
            BusinessPayload::FacebookAccount(_) => WorkOrderSubtype::FacebookAccount,
            BusinessPayload::Deposit(_) => WorkOrderSubtype::Deposit,
            BusinessPayload::Withdrawal(_) => WorkOrderSubtype::Withdrawal,
            BusinessPayload::Transfer(_) => WorkOrderSubtype::Transfer,
            BusinessPayload::Bind(_) => WorkOrderSubtype::Bind,
            BusinessPayload::Unbind(_) => WorkOrderSubtype::Unbind,
            BusinessPayload::Attachment(_) => WorkOrderSubtype::Attachment,
            BusinessPayload::Payment(_) => WorkOrderSubtype::Payment,
        }
    }

    /// Platform and application fields, for the account-application subtypes.
    pub fn application(&self) -> Option<(Platform, &AccountApplication)> {
        match self {
            BusinessPayload::GoogleAccount(a) => Some((Platform::Google, a)),
            BusinessPayload::TiktokAccount(a) => Some((Platform::Tiktok, a)),
            BusinessPayload::FacebookAccount(a) => Some((Platform::Facebook, a)),
            _ => None,
        }
    }

    /// Shape checks that need no database access. Company ownership for
    /// applications is checked by the work order service.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        match self {
            BusinessPayload::GoogleAccount(a)
            | BusinessPayload::TiktokAccount(a)
            | BusinessPayload::FacebookAccount(a) => {
                validation::require_text("account_name", &a.account_name, 128)?;
                validation::require_text("timezone", &a.timezone, 64)?;
                validation::currency(&a.currency)?;
                validation::http_url("promotion_link", &a.promotion_link)
            }
            BusinessPayload::Deposit(f) | BusinessPayload::Withdrawal(f) => {
                validation::media_account_id("media_account_id", &f.media_account_id)?;
                validation::positive_amount("amount_cents", f.amount_cents)?;
                validation::currency(&f.currency)
            }
            BusinessPayload::Transfer(t) => {
                validation::media_account_id("from_media_account_id", &t.from_media_account_id)?;
                validation::media_account_id("to_media_account_id", &t.to_media_account_id)?;
                if t.from_media_account_id.trim() == t.to_media_account_id.trim() {
                    return Err(AppError::Validation(
                        "Cannot transfer to the same account".to_string(),
                    ));
                }
                validation::positive_amount("amount_cents", t.amount_cents)?;
                validation::currency(&t.currency)
            }
            BusinessPayload::Bind(b) => {
                validation::media_account_id("media_account_id", &b.media_account_id)?;
                b.binding_type.validate_value("binding_value", &b.binding_value)
            }
            BusinessPayload::Unbind(u) => {
                validation::media_account_id("media_account_id", &u.media_account_id)?;
                u.binding_type.validate_value("unbinding_value", &u.unbinding_value)
            }
            BusinessPayload::Attachment(s) => {
                validation::media_account_id("media_account_id", &s.media_account_id)?;
                if s.attachments.is_empty() || s.attachments.len() > MAX_ATTACHMENTS {
                    return Err(AppError::Validation(format!(
                        "attachments must contain 1 to {MAX_ATTACHMENTS} files"
                    )));
                }
                s.attachments.iter().try_for_each(AttachmentFile::validate)
            }
            BusinessPayload::Payment(p) => {
                validation::positive_amount("amount_cents", p.amount_cents)?;
                validation::currency(&p.currency)?;
                validation::require_text("payment_reference", &p.payment_reference, 128)?;
                validation::require_text("payer_name", &p.payer_name, 128)?;
                if p.paid_at > now + Duration::minutes(PAID_AT_SKEW_MINUTES) {
                    return Err(AppError::Validation(
                        "paid_at must not be in the future".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Body of `POST /api/v1/work-orders` and `PUT /api/v1/work-orders/{id}`.
#[derive(Debug, Deserialize)]
pub struct WorkOrderRequest {
    #[serde(flatten)]
    pub payload: BusinessPayload,
    pub remark: Option<String>,
    /// Free-form JSON object stored with the work order.
    pub metadata: Option<serde_json::Value>,
    /// Save without submitting to the gateway; the order stays `INIT`.
    #[serde(default)]
    pub draft: bool,
}

impl WorkOrderRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.payload.validate(now)?;
        if let Some(remark) = &self.remark {
            if remark.chars().count() > 1000 {
                return Err(AppError::Validation(
                    "remark must be at most 1000 characters".to_string(),
                ));
            }
        }
        match &self.metadata {
            None | Some(serde_json::Value::Object(_)) => Ok(()),
            Some(_) => Err(AppError::Validation(
                "metadata must be a JSON object".to_string(),
            )),
        }
    }
}

// Rows read back from the business data tables.

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccountApplicationData {
    pub work_order_id: Uuid,
    pub platform: String,
    pub company_info_id: Uuid,
    pub account_name: String,
    pub timezone: String,
    pub currency: String,
    pub promotion_link: String,
}

/// Row of `account_deposit_data` or `account_withdrawal_data`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccountFundsData {
    pub work_order_id: Uuid,
    pub media_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccountTransferData {
    pub work_order_id: Uuid,
    pub from_media_account_id: String,
    pub to_media_account_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccountBindingData {
    pub work_order_id: Uuid,
    pub media_account_id: String,
    pub binding_type: String,
    pub binding_value: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AccountUnbindingData {
    pub work_order_id: Uuid,
    pub media_account_id: String,
    pub binding_type: String,
    pub unbinding_value: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AttachmentRecord {
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub media_account_id: String,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub file_size: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentRecord {
    pub work_order_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub payment_reference: String,
    pub payer_name: String,
    pub paid_at: DateTime<Utc>,
}

/// Payment record joined with the status of its work order.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentListItem {
    pub work_order_id: Uuid,
    pub task_number: String,
    pub status: String,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub payment_reference: String,
    pub payer_name: String,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Query string for `GET /api/v1/payments`.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub status: Option<crate::models::work_order::WorkOrderStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
