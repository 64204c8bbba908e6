//! Authentication adapters - `SessionValidator` implementations.

mod mock;
mod oidc;

pub use mock::MockSessionValidator;
pub use oidc::OidcSessionValidator;
