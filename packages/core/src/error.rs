//! Error taxonomy, mapped to the CLI's exit codes.

use schema_sync_db::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Malformed connection config or data model, surfaced before any
    /// database work.
    #[error("{0}")]
    Config(String),

    /// Cannot open or authenticate a module connection.
    #[error("connecting module '{module}': {source}")]
    Connect {
        module: String,
        #[source]
        source: GatewayError,
    },

    /// Model references an unknown module, or a module's default engine is
    /// not InnoDB.
    #[error("integrity probe failed for module '{module}': {reason}")]
    Integrity { module: String, reason: String },

    /// `information_schema` query failed.
    #[error("introspection failed: {0}")]
    Introspection(#[from] GatewayError),

    /// An emitted DDL statement failed.
    #[error("DDL failed in module '{module}' at phase '{phase}': {statement}\ncaused by: {source}")]
    Ddl {
        module: String,
        phase: &'static str,
        statement: String,
        #[source]
        source: GatewayError,
    },

    /// Operator declined the master prompt, or supplied an invalid menu
    /// selection.
    #[error("cancelled by user")]
    UserCancel,
}

impl ReconcileError {
    /// `0` success, `1` validation failure, `2` DDL failure, `3` cancelled by
    /// user. `Connect`/`Integrity`/`Introspection` are grouped with
    /// validation failures since they are all "fix input or environment and
    /// rerun" outcomes that precede any mutation.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Connect { .. } | Self::Integrity { .. } | Self::Introspection(_) => 1,
            Self::Ddl { .. } => 2,
            Self::UserCancel => 3,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
