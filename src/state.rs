//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::third_party::ThirdPartyClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub gateway: ThirdPartyClient,
    pub config: Arc<Config>,
}

/// Lets handlers that only need the database extract `State<DbPool>`.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

/// State over a lazy pool and a gateway nobody listens on.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    let gateway = ThirdPartyClient::new(
        "http://127.0.0.1:9",
        "test-key",
        std::time::Duration::from_secs(1),
    )
    .expect("gateway client");

    AppState {
        pool: crate::db::lazy_test_pool(),
        gateway,
        config: Arc::new(crate::config::test_config("http://127.0.0.1:9")),
    }
}
