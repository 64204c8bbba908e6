//! HTTP surface for the Tiny ERP integration.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::ErpAppState;
pub use routes::erp_routes;
