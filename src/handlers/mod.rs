//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to a service for validation, gateway calls and database writes
//! 3. Returns the standard JSON envelope
/// Login, logout, refresh, current user
pub mod auth;
/// Company information
pub mod companies;
/// Liveness and database connectivity
pub mod health;
/// Payment tracking
pub mod payments;
/// User administration
pub mod users;
/// Work order lifecycle
pub mod work_orders;
