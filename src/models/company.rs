//! Company information a customer registers before applying for ad accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::business::AttachmentFile;
use crate::validation;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CompanyInfo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub registration_number: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub address: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Business license, tax certificate and similar files.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CompanyAttachment {
    pub id: Uuid,
    pub company_info_id: Uuid,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub file_size: i64,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub company_name: String,
    pub registration_number: String,
    pub country: String,
    pub address: Option<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentFile>,
}

impl CreateCompanyRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validation::require_text("company_name", &self.company_name, 255)?;
        validation::require_text("registration_number", &self.registration_number, 64)?;
        if self.country.len() != 2 || !self.country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(AppError::Validation(
                "country must be a 2-letter uppercase ISO code".to_string(),
            ));
        }
        validation::require_text("contact_name", &self.contact_name, 128)?;
        validation::email("contact_email", &self.contact_email)?;
        if let Some(phone) = &self.contact_phone {
            validation::require_text("contact_phone", phone, 32)?;
        }
        if self.attachments.len() > crate::models::business::MAX_ATTACHMENTS {
            return Err(AppError::Validation("too many attachments".to_string()));
        }
        self.attachments.iter().try_for_each(AttachmentFile::validate)
    }
}

/// Body of `POST /api/v1/companies/{id}/attachments`.
#[derive(Debug, Deserialize)]
pub struct AddCompanyAttachmentsRequest {
    pub attachments: Vec<AttachmentFile>,
}

#[derive(Debug, Serialize)]
pub struct CompanyDetail {
    #[serde(flatten)]
    pub company: CompanyInfo,
    pub attachments: Vec<CompanyAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateCompanyRequest {
        CreateCompanyRequest {
            company_name: "Acme Trading Ltd".to_string(),
            registration_number: "91310000MA1FL0000X".to_string(),
            country: "CN".to_string(),
            address: None,
            contact_name: "Li Lei".to_string(),
            contact_email: "lilei@acme.test".to_string(),
            contact_phone: Some("+86 21 5555 0000".to_string()),
            attachments: vec![],
        }
    }

    #[test]
    fn valid_company_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn country_must_be_alpha2() {
        let mut req = request();
        req.country = "CHN".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn attachments_are_checked() {
        let mut req = request();
        req.attachments.push(AttachmentFile {
            file_name: "license.doc".to_string(),
            file_url: "https://bucket.example.com/license.doc".to_string(),
            mime_type: "application/msword".to_string(),
            file_size: 100,
        });
        assert!(req.validate().is_err());
    }
}
