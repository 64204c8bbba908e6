//! Tiny ERP adapter - `ErpGateway` implementation over Tiny's REST API.

mod tiny_client;

pub use tiny_client::TinyErpClient;
