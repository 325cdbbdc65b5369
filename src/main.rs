//! Ad Work Order Service - Main Application Entry Point
//!
//! This is a REST API back office for ad-account work orders. Customers file
//! Google/TikTok/Facebook account applications and account operations
//! (deposit, withdrawal, transfer, binding, unbinding), attach documents and
//! record payments. Every submission is forwarded to the ad-platform gateway
//! and tracked through review.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: Session token (Bearer header or HttpOnly cookie), SHA-256 hashed at rest
//! - **Gateway**: reqwest client to the third-party ad-platform API
//! - **Format**: JSON envelope `{code, success, message, data}`
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Seed the bootstrap admin if configured
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod middleware;
mod models;
mod response;
mod services;
mod state;
mod validation;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::third_party::ThirdPartyClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    services::auth_service::ensure_bootstrap_admin(&pool, &config).await?;

    let gateway = ThirdPartyClient::from_config(&config)?;
    tracing::info!(base_url = %config.third_party_base_url, "Gateway client ready");

    let addr = format!("0.0.0.0:{}", config.server_port);

    let state = AppState {
        pool,
        gateway,
        config: Arc::new(config),
    };
    let app = build_router(state);

    // Bind to network address and start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble every route with its middleware stack.
fn build_router(state: AppState) -> Router {
    // Operator-only routes. `require_admin` reads the AuthContext, so the
    // authentication layer is added after it and runs first.
    let admin_routes = Router::new()
        .route("/api/v1/users", post(handlers::users::create_user))
        .route("/api/v1/users", get(handlers::users::list_users))
        .route("/api/v1/users/{id}", delete(handlers::users::delete_user))
        .route(
            "/api/v1/work-orders/{id}/raw-data",
            get(handlers::work_orders::get_raw_data),
        )
        .route(
            "/api/v1/admin/work-orders/{id}/status",
            patch(handlers::work_orders::update_status),
        )
        .route_layer(axum_middleware::from_fn(middleware::auth::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Session routes
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Company routes
        .route(
            "/api/v1/companies",
            post(handlers::companies::create_company).get(handlers::companies::list_companies),
        )
        .route(
            "/api/v1/companies/{id}",
            get(handlers::companies::get_company),
        )
        .route(
            "/api/v1/companies/{id}/attachments",
            post(handlers::companies::add_attachments),
        )
        // Work order routes
        .route(
            "/api/v1/work-orders",
            post(handlers::work_orders::create_work_order)
                .get(handlers::work_orders::list_work_orders),
        )
        .route(
            "/api/v1/work-orders/{id}",
            get(handlers::work_orders::get_work_order)
                .put(handlers::work_orders::update_work_order),
        )
        .route(
            "/api/v1/work-orders/{id}/cancel",
            post(handlers::work_orders::cancel_work_order),
        )
        // Payment tracking
        .route("/api/v1/payments", get(handlers::payments::list_payments))
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .merge(authenticated_routes)
        .merge(admin_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http());

    let app = match cors {
        Some(cors) => app.layer(cors),
        None => app,
    };

    // Share pool, gateway client and config with all handlers via State extraction
    app.with_state(state)
}

/// CORS for a single browser origin. Credentials are allowed so the session
/// cookie travels with cross-origin requests.
fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(%origin, error = %e, "Ignoring invalid CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::read_envelope;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(state::test_state())
    }

    #[tokio::test]
    async fn protected_routes_require_a_session() {
        for (method, uri) in [
            ("GET", "/api/v1/work-orders"),
            ("POST", "/api/v1/auth/logout"),
            ("GET", "/api/v1/payments"),
            ("GET", "/api/v1/users"),
            ("PATCH", "/api/v1/admin/work-orders/3f1c3c56-8f43-4a57-bb9e-0f7d0f1d2c11/status"),
        ] {
            let response = app()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            let body = read_envelope(response).await;
            assert_eq!(body["code"], "UNAUTHORIZED");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn malformed_login_body_is_a_validation_error() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"username\": \"acme\""))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_envelope(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nothing-here")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_cors_origin_is_ignored() {
        assert!(cors_layer(None).is_none());
        assert!(cors_layer(Some("https://ops.example.com")).is_some());
        assert!(cors_layer(Some("bad\norigin")).is_none());
    }

    #[tokio::test]
    async fn sliding_cookie_session_gets_a_fresh_cookie() {
        let Some(pool) = db::test_database("sliding_cookie_session_gets_a_fresh_cookie").await
        else {
            return;
        };
        let user = services::user_service::create_test_customer(&pool, "long enough").await;
        let near_expiry = chrono::Utc::now() + chrono::Duration::minutes(5);
        let (cookie_token, _) = services::auth_service::create_session(&pool, user.id, near_expiry)
            .await
            .unwrap();
        let (bearer_token, _) = services::auth_service::create_session(&pool, user.id, near_expiry)
            .await
            .unwrap();

        let mut state = state::test_state();
        state.pool = pool;
        let expected = middleware::auth::session_cookie(&cookie_token, &state.config);
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/me")
                    .header(header::COOKIE, format!("session_token={cookie_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            expected.as_str()
        );

        // API clients hold the token themselves; no cookie is pushed on them.
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {bearer_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }
}
