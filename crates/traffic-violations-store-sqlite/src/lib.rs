//! SQLite persistence for traffic-violation records.
//!
//! Every repository operation opens its own connection through a
//! [`ConnectionScope`], runs inside one transaction, and closes the
//! connection before returning. Column order in the stored table mirrors the
//! [`traffic_violations_core::FieldSchema`] order, which
//! [`initialize_schema`] verifies.

mod error;
mod repository;
mod schema;
mod scope;
mod service;

#[cfg(test)]
mod test_support;

pub use error::StoreError;
pub use repository::{Repository, SqliteViolationRepository, ViolationRepository, SEARCH_LABELS};
pub use schema::{initialize_schema, VIOLATIONS_TABLE};
pub use scope::{ConnectionScope, ScopeHandle};
pub use service::{ServiceError, ViolationService};
