//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and calls to the ad-platform gateway.

pub mod auth_service;
pub mod business_data;
pub mod company_service;
pub mod third_party;
pub mod user_service;
pub mod work_order_service;
