//! ERP integration domain types.

mod credential;

pub use credential::{TinyCredential, EXPIRY_MARGIN_SECS};
