//! Database Gateway and SQL Fragment Builder for the MySQL/MariaDB family.
//!
//! This crate is deliberately narrow: it knows how to render DDL strings and
//! how to run them and introspect their effect against one MySQL schema. It
//! has no notion of a "data model", a "case policy", or a "reconciliation
//! plan" — those live in `schema_sync_core`, which depends on this crate.

pub mod error;
pub mod gateway;
pub mod introspection;
pub mod schema;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{Gateway, MySqlGateway};
pub use introspection::{ColumnInfo, ForeignKeyInfo, IndexInfo, TableSummary};
