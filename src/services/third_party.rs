//! Client for the ad-platform gateway the work orders are proxied to.
//!
//! Every call is a JSON `POST` authenticated with a bearer key. The gateway
//! answers `{ "code": "0", "message": "...", "data": { "taskId": "..." } }`;
//! `code` sometimes arrives as a number and is normalised to a string here.
//!
//! The client never retries. A transport failure or an unparseable body is
//! reported as `ThirdPartyUnavailable`; a parseable body with a non-zero code
//! is a normal [`GatewayExchange`] whose status is `FAILED`.

use std::time::Duration;

use serde_json::{Value, json};

use crate::config::Config;
use crate::error::AppError;
use crate::models::work_order::{THIRD_PARTY_SUCCESS_CODE, WorkOrderStatus, WorkOrderSubtype};

/// Gateway path used to submit a new work order of `subtype`.
pub fn submit_path(subtype: WorkOrderSubtype) -> &'static str {
    match subtype {
        WorkOrderSubtype::GoogleAccount => "/account/google/apply",
        WorkOrderSubtype::TiktokAccount => "/account/tiktok/apply",
        WorkOrderSubtype::FacebookAccount => "/account/facebook/apply",
        WorkOrderSubtype::Deposit => "/account/deposit",
        WorkOrderSubtype::Withdrawal => "/account/withdrawal",
        WorkOrderSubtype::Transfer => "/account/transfer",
        WorkOrderSubtype::Bind => "/account/bind",
        WorkOrderSubtype::Unbind => "/account/unbind",
        WorkOrderSubtype::Attachment => "/account/attachment",
        WorkOrderSubtype::Payment => "/payment/submit",
    }
}

/// Gateway path used to resubmit an existing work order.
pub fn update_path(subtype: WorkOrderSubtype) -> String {
    format!("{}/update", submit_path(subtype))
}

/// One request/response round trip, kept verbatim for the raw data audit row.
#[derive(Debug, Clone)]
pub struct GatewayExchange {
    pub request: Value,
    pub response: Value,
    pub code: String,
    pub message: String,
    pub task_id: Option<String>,
}

impl GatewayExchange {
    pub fn accepted(&self) -> bool {
        self.code == THIRD_PARTY_SUCCESS_CODE
    }

    /// Status the work order takes after this exchange.
    pub fn status(&self) -> WorkOrderStatus {
        WorkOrderStatus::from_third_party_code(&self.code)
    }

    /// Raw data row content: both halves plus the path they went to.
    pub fn audit_request(&self, path: &str) -> Value {
        json!({ "path": path, "body": self.request })
    }
}

/// Turn a scalar JSON value into a string, keeping numbers without quotes.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read code, message and task id out of a gateway response body.
pub fn parse_response(request: Value, response: Value) -> Result<GatewayExchange, AppError> {
    let code = response
        .get("code")
        .and_then(scalar_to_string)
        .ok_or_else(|| {
            AppError::ThirdPartyUnavailable("response has no code field".to_string())
        })?;

    let message = response
        .get("message")
        .or_else(|| response.get("msg"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let task_id = response
        .get("data")
        .and_then(|data| data.get("taskId"))
        .and_then(scalar_to_string);

    Ok(GatewayExchange {
        request,
        response,
        code,
        message,
        task_id,
    })
}

#[derive(Debug, Clone)]
pub struct ThirdPartyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ThirdPartyClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            &config.third_party_base_url,
            &config.third_party_api_key,
            Duration::from_secs(config.third_party_timeout_secs),
        )
    }

    /// POST `body` to `path` and parse the gateway envelope.
    pub async fn call(&self, path: &str, body: Value) -> Result<GatewayExchange, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(%path, error = %e, "gateway request failed");
                AppError::ThirdPartyUnavailable(format!("request failed: {}", e))
            })?;

        let http_status = response.status();
        let payload = response.json::<Value>().await.map_err(|e| {
            tracing::error!(%path, %http_status, error = %e, "gateway returned a non-JSON body");
            AppError::ThirdPartyUnavailable(format!("invalid response (HTTP {}): {}", http_status, e))
        })?;

        let exchange = parse_response(body, payload)?;
        tracing::info!(
            %path,
            %http_status,
            code = %exchange.code,
            task_id = exchange.task_id.as_deref().unwrap_or("-"),
            "gateway answered"
        );

        Ok(exchange)
    }
}

/// Serve `router` on an ephemeral port and return its base URL.
#[cfg(test)]
pub(crate) async fn spawn_gateway(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Gateway that answers every path with `code` and task id `T-1`, and
/// counts the calls it receives.
#[cfg(test)]
pub(crate) async fn mock_gateway(
    code: &'static str,
) -> (ThirdPartyClient, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::{Arc, atomic::AtomicUsize, atomic::Ordering};

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = axum::Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            axum::Json(json!({
                "code": code,
                "message": if code == THIRD_PARTY_SUCCESS_CODE { "ok" } else { "media account frozen" },
                "data": { "taskId": "T-1" }
            }))
        }
    });

    let base = spawn_gateway(router).await;
    let client = ThirdPartyClient::new(&base, "test-key", Duration::from_secs(2)).unwrap();
    (client, hits)
}
