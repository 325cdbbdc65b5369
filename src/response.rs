//! JSON response envelope shared by every endpoint.

use serde::Serialize;

use crate::error::AppError;

/// Code placed in the envelope of every successful response.
pub const SUCCESS_CODE: &str = "SUCCESS";

/// Standard response body.
///
/// # JSON Example
///
/// ```json
/// {
///   "code": "SUCCESS",
///   "success": true,
///   "message": "OK",
///   "data": { "id": "550e8400-e29b-41d4-a716-446655440000" }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: &'static str,
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            success: true,
            message: "OK".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(code: &'static str, message: String, data: Option<T>) -> Self {
        Self {
            code,
            success: false,
            message,
            data,
        }
    }
}

impl ApiResponse<()> {
    /// Success with a message and no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: SUCCESS_CODE,
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// A page of results plus the total count of matching rows.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Resolved `page` / `page_size` query parameters and the row offset they select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub offset: i64,
}

impl Pagination {
    /// Page numbers start at 1 and page sizes are clamped to 1..=100. A page so
    /// far out that its offset overflows is a `VALIDATION_ERROR`.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;

        Ok(Self {
            page,
            page_size,
            offset,
        })
    }
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        }
    }
}

/// Collect a handler response body and parse it as JSON.
#[cfg(test)]
pub(crate) async fn read_envelope(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Send a bodiless request through `router` and return status plus envelope.
#[cfg(test)]
pub(crate) async fn send_empty(
    router: axum::Router,
    method: &str,
    uri: &str,
) -> (axum::http::StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let request = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    (status, read_envelope(response).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::success(json!({ "id": 7 }))).unwrap();
        assert_eq!(
            body,
            json!({ "code": "SUCCESS", "success": true, "message": "OK", "data": { "id": 7 } })
        );
    }

    #[test]
    fn message_envelope_has_null_data() {
        let body = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(body["message"], "Logged out");
        assert!(body["data"].is_null());
        assert_eq!(body["success"], true);
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(
            Pagination::new(Some(0), Some(1000)).unwrap(),
            Pagination {
                page: 1,
                page_size: MAX_PAGE_SIZE,
                offset: 0
            }
        );
        assert_eq!(Pagination::new(None, None).unwrap().page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(Pagination::new(Some(3), Some(25)).unwrap().offset, 50);
    }

    #[test]
    fn huge_page_is_a_validation_error() {
        let err = Pagination::new(Some(i64::MAX), Some(MAX_PAGE_SIZE)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        // The last page whose offset still fits is accepted.
        let last = i64::MAX / MAX_PAGE_SIZE;
        assert!(Pagination::new(Some(last), Some(MAX_PAGE_SIZE)).is_ok());
    }
}
