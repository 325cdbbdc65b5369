//! Data models representing database entities and request/response bodies.

/// Subtype payloads and business data rows
pub mod business;
/// Company information and its attachments
pub mod company;
/// Users and sessions
pub mod user;
/// Work orders, raw gateway data and lifecycle rules
pub mod work_order;
