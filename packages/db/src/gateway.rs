//! The Database Gateway: one narrow async trait, one MySQL implementation.
//! A single connection held behind a `tokio::sync::Mutex` for the lifetime
//! of a unit of work, `log::trace!` around every statement, and the `SET
//! FOREIGN_KEY_CHECKS` session toggle exposed as an explicit gateway
//! method so the engine can scope it around a whole run.

use async_trait::async_trait;
use sqlx::Executor;
use tokio::sync::Mutex;

use crate::error::{GatewayError, GatewayResult};
use crate::introspection::{self, ColumnInfo, ForeignKeyInfo, IndexInfo, TableSummary};

/// Per-module operations the reconciliation engine needs. Transaction-agnostic
/// on purpose — MySQL's DDL statements implicitly commit (see DESIGN.md), so
/// `commit`/`rollback` are bookkeeping for the run's state rather than a
/// literal multi-statement rollback.
#[async_trait]
pub trait Gateway: Send + Sync {
    fn schema(&self) -> &str;

    async fn introspect_tables(&self) -> GatewayResult<Vec<TableSummary>>;
    async fn introspect_columns(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>>;
    async fn introspect_indexes(&self, table: &str) -> GatewayResult<Vec<IndexInfo>>;
    async fn introspect_foreign_keys(&self, table: &str) -> GatewayResult<Vec<ForeignKeyInfo>>;

    async fn set_foreign_key_checks(&self, enabled: bool) -> GatewayResult<()>;
    async fn execute(&self, statement: &str) -> GatewayResult<()>;
    async fn engine_supports_innodb(&self) -> GatewayResult<bool>;

    async fn commit(&self) -> GatewayResult<()>;
    async fn rollback(&self) -> GatewayResult<()>;
}

/// A single pooled MySQL connection, held exclusively for one module's
/// reconciliation run.
pub struct MySqlGateway {
    schema: String,
    conn: Mutex<sqlx::pool::PoolConnection<sqlx::MySql>>,
}

impl MySqlGateway {
    /// Connects to `schema` using `pool`, which must already be scoped to
    /// that database (or issues `USE <schema>` itself via the pool's
    /// connect options).
    pub async fn connect(pool: &sqlx::MySqlPool, schema: &str) -> GatewayResult<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|source| GatewayError::Connect {
                schema: schema.to_string(),
                source,
            })?;
        Ok(Self {
            schema: schema.to_string(),
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl Gateway for MySqlGateway {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn introspect_tables(&self) -> GatewayResult<Vec<TableSummary>> {
        log::trace!("introspect_tables: schema={}", self.schema);
        let mut conn = self.conn.lock().await;
        introspection::list_tables(&mut conn, &self.schema).await
    }

    async fn introspect_columns(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        log::trace!("introspect_columns: schema={} table={table}", self.schema);
        let mut conn = self.conn.lock().await;
        introspection::list_columns(&mut conn, &self.schema, table).await
    }

    async fn introspect_indexes(&self, table: &str) -> GatewayResult<Vec<IndexInfo>> {
        log::trace!("introspect_indexes: schema={} table={table}", self.schema);
        let mut conn = self.conn.lock().await;
        introspection::list_indexes(&mut conn, &self.schema, table).await
    }

    async fn introspect_foreign_keys(&self, table: &str) -> GatewayResult<Vec<ForeignKeyInfo>> {
        log::trace!(
            "introspect_foreign_keys: schema={} table={table}",
            self.schema
        );
        let mut conn = self.conn.lock().await;
        introspection::list_foreign_keys(&mut conn, &self.schema, table).await
    }

    async fn set_foreign_key_checks(&self, enabled: bool) -> GatewayResult<()> {
        let flag = u8::from(enabled);
        log::debug!("set_foreign_key_checks: schema={} -> {flag}", self.schema);
        let mut conn = self.conn.lock().await;
        conn.execute(format!("SET FOREIGN_KEY_CHECKS={flag}").as_str())
            .await
            .map_err(|source| GatewayError::Ddl {
                schema: self.schema.clone(),
                statement: format!("SET FOREIGN_KEY_CHECKS={flag}"),
                source,
            })?;
        Ok(())
    }

    async fn execute(&self, statement: &str) -> GatewayResult<()> {
        log::trace!("execute: schema={}: query:\n{statement}", self.schema);
        let mut conn = self.conn.lock().await;
        conn.execute(statement)
            .await
            .map_err(|source| GatewayError::Ddl {
                schema: self.schema.clone(),
                statement: statement.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn engine_supports_innodb(&self) -> GatewayResult<bool> {
        let mut conn = self.conn.lock().await;
        introspection::default_storage_engine_is_innodb(&mut conn, &self.schema).await
    }

    async fn commit(&self) -> GatewayResult<()> {
        log::debug!("commit: schema={} (best-effort, DDL already applied)", self.schema);
        Ok(())
    }

    async fn rollback(&self) -> GatewayResult<()> {
        log::debug!(
            "rollback: schema={} (no-op; MySQL DDL implicitly commits)",
            self.schema
        );
        Ok(())
    }
}
