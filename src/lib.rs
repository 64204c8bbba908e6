//! Shopforge billing core.
//!
//! Webhook-driven subscription billing reconciliation for a multi-tenant
//! storefront builder, plus the Tiny ERP token broker and the idempotent
//! retry ledger both of them lean on.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
