//! Schema reconciliation: a declarative data model plus a connection
//! config go in, idempotent DDL against one or more MySQL/MariaDB schemas
//! comes out.
//!
//! Layering mirrors the package split: [`schema_sync_db`] knows how to talk
//! to a single MySQL schema; this crate knows nothing about SQL wire
//! protocol and everything about what the model *means* — case
//! translation, validation, the phased diff, and the pluggable prompting
//! surface the engine runs behind.

pub mod case;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod model;
pub mod validate;

pub use case::CasePolicy;
pub use engine::{DropMode, Summary, reconcile};
pub use error::{ReconcileError, ReconcileResult};
pub use interaction::{AcceptAll, Answer, Confirm, Level, NullReporter, Reporter, Scripted};
pub use model::{ConnectionConfig, DataModel, EntityDefinition};
