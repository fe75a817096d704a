// src/ingest/providers/mod.rs
pub mod audit;
pub mod billing;
pub mod infra;

pub use audit::AuditTrailProvider;
pub use billing::{BillingProvider, BillingRule};
pub use infra::InfraEventsProvider;
