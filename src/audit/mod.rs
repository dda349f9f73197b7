//! Durable audit trail for cache mutations.

mod error;
mod schema;
mod store;
mod types;

pub use error::AuditError;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use store::{default_audit_path, AuditStore};
pub use types::{
    AuditRecord, NewAuditRecord, NewAuditRecordBuilder, Page, SearchFilter, Statistics,
};
