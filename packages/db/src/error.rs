use thiserror::Error;

/// Everything that can go wrong while talking to the target database.
///
/// Connection setup, introspection, and DDL execution each get their own
/// variant so the caller can map failures onto exit codes without
/// inspecting driver-specific error text.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to connect to '{schema}': {source}")]
    Connect {
        schema: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("storage engine integrity probe failed for '{schema}': {reason}")]
    Integrity { schema: String, reason: String },

    #[error("introspection of '{schema}.{table}' failed: {source}")]
    Introspection {
        schema: String,
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("statement failed against '{schema}': {statement}\ncaused by: {source}")]
    Ddl {
        schema: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("unsupported column type reported by server: {0}")]
    UnsupportedDataType(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
