//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `billing` - Subscription reconciliation and webhook processing
//! - `erp` - Tiny ERP integration types

pub mod billing;
pub mod erp;
pub mod foundation;
