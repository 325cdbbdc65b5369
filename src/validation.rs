//! Field validation shared by request payloads.
//!
//! All checks return `AppError::Validation` with a message naming the field,
//! so clients can show it next to the offending input.

use crate::error::AppError;

pub const MAX_URL_LEN: usize = 2048;
pub const MAX_ATTACHMENT_BYTES: i64 = 20 * 1024 * 1024;
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["application/pdf", "image/png", "image/jpeg"];

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

/// Non-blank string of at most `max` characters.
pub fn require_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

pub fn positive_amount(field: &str, amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(invalid(format!("{field} must be positive")));
    }
    Ok(())
}

/// ISO 4217 shape: three uppercase ASCII letters.
pub fn currency(value: &str) -> Result<(), AppError> {
    if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid("currency must be a 3-letter uppercase ISO code"))
    }
}

pub fn media_account_id(field: &str, value: &str) -> Result<(), AppError> {
    require_text(field, value, 64)?;
    if value.chars().any(char::is_whitespace) {
        return Err(invalid(format!("{field} must not contain whitespace")));
    }
    Ok(())
}

/// Loose email check; the gateway does the real verification.
pub fn email(field: &str, value: &str) -> Result<(), AppError> {
    require_text(field, value, 255)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(invalid(format!("{field} must be a valid email address"))),
    }
}

/// Absolute http(s) URL of at most 2048 characters.
pub fn http_url(field: &str, value: &str) -> Result<(), AppError> {
    if value.len() > MAX_URL_LEN {
        return Err(invalid(format!(
            "{field} exceeds {MAX_URL_LEN} characters"
        )));
    }

    let parsed =
        url::Url::parse(value).map_err(|_| invalid(format!("{field} is not a valid URL")))?;

    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(invalid(format!("{field} must use HTTP or HTTPS"))),
    }
}

/// Username: 3-64 characters from `[A-Za-z0-9_.-]`.
pub fn username(value: &str) -> Result<(), AppError> {
    let len = value.chars().count();
    if !(3..=64).contains(&len) {
        return Err(invalid("username must be 3-64 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(invalid(
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), AppError> {
    if value.chars().count() < 8 {
        return Err(invalid("password must be at least 8 characters"));
    }
    if value.len() > 256 {
        return Err(invalid("password is too long"));
    }
    Ok(())
}

/// File already uploaded to object storage, referenced by URL.
pub fn attachment(file_name: &str, file_url: &str, mime_type: &str, file_size: i64) -> Result<(), AppError> {
    require_text("file_name", file_name, 255)?;
    http_url("file_url", file_url)?;
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(invalid(format!(
            "mime_type must be one of {}",
            ALLOWED_MIME_TYPES.join(", ")
        )));
    }
    if file_size <= 0 || file_size > MAX_ATTACHMENT_BYTES {
        return Err(invalid("file_size must be between 1 byte and 20 MiB"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_shape() {
        assert!(currency("USD").is_ok());
        assert!(currency("usd").is_err());
        assert!(currency("US").is_err());
        assert!(currency("USDT").is_err());
    }

    #[test]
    fn urls_must_be_http() {
        assert!(http_url("link", "https://shop.example.com/landing").is_ok());
        assert!(http_url("link", "http://localhost:8080/a.pdf").is_ok());
        assert!(http_url("link", "ftp://example.com/file").is_err());
        assert!(http_url("link", "example.com").is_err());

        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        let err = http_url("link", &long).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn attachment_rules() {
        let url = "https://bucket.example.com/license.pdf";
        assert!(attachment("license.pdf", url, "application/pdf", 1024).is_ok());
        assert!(attachment("license.exe", url, "application/x-msdownload", 1024).is_err());
        assert!(attachment("license.pdf", url, "application/pdf", 0).is_err());
        assert!(attachment("license.pdf", url, "application/pdf", MAX_ATTACHMENT_BYTES + 1).is_err());
        assert!(attachment(" ", url, "application/pdf", 10).is_err());
    }

    #[test]
    fn username_rules() {
        assert!(username("acme.ops-1").is_ok());
        assert!(username("ab").is_err());
        assert!(username("has space").is_err());
    }

    #[test]
    fn text_limits_count_characters() {
        assert!(require_text("name", "账户名称", 4).is_ok());
        assert!(require_text("name", "账户名称!", 4).is_err());
        assert!(require_text("name", "   ", 4).is_err());
    }

    #[test]
    fn email_shape() {
        assert!(email("email", "ops@acme.test").is_ok());
        assert!(email("email", "ops@localhost").is_err());
        assert!(email("email", "@acme.test").is_err());
    }
}
