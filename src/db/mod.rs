//! PostgreSQL access: descriptors, sessions, statement execution and row decoding.
//!
//! Layout:
//! - `descriptor.rs`: connection descriptor sent by the dashboard, SSL modes
//! - `session.rs`: transient per-request connections and the shared pool
//! - `query.rs` / `params.rs` / `rows.rs`: generic statement execution
//! - `introspection.rs`: fixed `information_schema` queries
//! - `schema.rs`: DDL for the dashboard's own tables

pub mod descriptor;
pub mod introspection;
pub mod params;
pub mod query;
pub mod rows;
pub mod schema;
pub mod session;

pub use descriptor::{ConnectionDescriptor, SslMode};
pub use introspection::{ColumnInfo, TableInfo};
pub use query::QueryOutput;
pub use schema::APP_SCHEMA;
pub use session::{Session, shared_pool};
