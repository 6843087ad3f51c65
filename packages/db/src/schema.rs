//! Builders for the MySQL/MariaDB DDL dialect.
//!
//! Each statement type exposes a fluent `.column(...)`/`.table(...)`-style
//! API ending in `.execute(gateway)`, the same shape as building up a
//! statement before handing it to a connection. `.statement()` renders the
//! same SQL without running it, which the reconciliation engine uses to
//! attach the exact text to a DDL error.

use std::fmt;

use crate::error::GatewayResult;
use crate::gateway::Gateway;

/// A column's default clause. `None` on [`ColumnDef::default`] means "no
/// explicit default" (rendered as `DEFAULT NULL` when the column is
/// nullable, omitted otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDefault {
    /// The `CURRENT_TIMESTAMP` sentinel — emitted unquoted.
    CurrentTimestamp,
    /// Any other literal — emitted as a quoted string.
    Literal(String),
}

/// The column facts a builder needs; independent of where they came from (a
/// model attribute, the locking column, or a relationship column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub sql_type: String,
    pub length_or_values: Option<String>,
    pub default: Option<ColumnDefault>,
    pub allow_null: bool,
}

impl ColumnDef {
    #[must_use]
    pub fn new(sql_type: impl Into<String>, allow_null: bool) -> Self {
        Self {
            sql_type: sql_type.into(),
            length_or_values: None,
            default: None,
            allow_null,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length_or_values: impl Into<String>) -> Self {
        self.length_or_values = Some(length_or_values.into());
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Index,
    Unique,
    Spatial,
    Fulltext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAlgorithm {
    Btree,
    Hash,
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Btree => "BTREE",
            Self::Hash => "HASH",
        })
    }
}

/// `col type[(lengthOrValues)] [NOT NULL] [DEFAULT …]`.
#[must_use]
pub fn column_clause(col: &str, def: &ColumnDef) -> String {
    let mut out = format!("{col} {}", def.sql_type);
    if let Some(lv) = &def.length_or_values {
        out.push('(');
        out.push_str(lv);
        out.push(')');
    }
    if !def.allow_null {
        out.push_str(" NOT NULL");
    }
    match &def.default {
        Some(ColumnDefault::CurrentTimestamp) => out.push_str(" DEFAULT CURRENT_TIMESTAMP"),
        Some(ColumnDefault::Literal(v)) => out.push_str(&format!(" DEFAULT '{v}'")),
        None if def.allow_null => out.push_str(" DEFAULT NULL"),
        None => {}
    }
    out
}

fn render_create_table(table: &str, pk_col: &str) -> String {
    format!("CREATE TABLE {table}({pk_col} BIGINT NOT NULL AUTO_INCREMENT, PRIMARY KEY({pk_col}))")
}

fn render_add_index(
    table: &str,
    index_name: &str,
    kind: IndexKind,
    col: &str,
    algorithm: IndexAlgorithm,
) -> String {
    let keyword = match kind {
        IndexKind::Index => "INDEX",
        IndexKind::Unique => "UNIQUE INDEX",
        IndexKind::Spatial => "SPATIAL INDEX",
        IndexKind::Fulltext => "FULLTEXT INDEX",
    };
    match kind {
        IndexKind::Index | IndexKind::Unique => {
            format!("ALTER TABLE {table} ADD {keyword} {index_name} ({col}) USING {algorithm}")
        }
        IndexKind::Spatial | IndexKind::Fulltext => {
            format!("ALTER TABLE {table} ADD {keyword} {index_name} ({col})")
        }
    }
}

/// Skeleton table: just the primary key. Every other column is added via
/// [`AlterTableStatement::add_column`] in the column reconciliation pass.
///
/// # Examples
///
/// ```
/// use schema_sync_db::schema::create_table;
///
/// let stmt = create_table("users").primary_key("id");
/// assert_eq!(
///     stmt.statement(),
///     "CREATE TABLE users(id BIGINT NOT NULL AUTO_INCREMENT, PRIMARY KEY(id))"
/// );
/// ```
#[must_use]
pub fn create_table(table: &str) -> CreateTableStatement<'_> {
    CreateTableStatement {
        table,
        pk_col: "id".to_string(),
    }
}

pub struct CreateTableStatement<'a> {
    table: &'a str,
    pk_col: String,
}

impl CreateTableStatement<'_> {
    #[must_use]
    pub fn primary_key(mut self, col: impl Into<String>) -> Self {
        self.pk_col = col.into();
        self
    }

    #[must_use]
    pub fn statement(&self) -> String {
        render_create_table(self.table, &self.pk_col)
    }

    /// # Errors
    ///
    /// Returns an error if the underlying `CREATE TABLE` fails.
    pub async fn execute(self, gateway: &dyn Gateway) -> GatewayResult<()> {
        gateway.execute(&self.statement()).await
    }
}

/// One operation in an [`AlterTableStatement`] chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterOperation {
    AddColumn { name: String, def: ColumnDef },
    ModifyColumn { name: String, def: ColumnDef },
    DropColumn { name: String },
    AddForeignKey {
        constraint_name: String,
        column: String,
        ref_table: String,
        ref_col: String,
    },
    DropForeignKey { constraint_name: String },
}

fn render_alter_operation(table: &str, op: &AlterOperation) -> String {
    match op {
        AlterOperation::AddColumn { name, def } => {
            format!("ALTER TABLE {table} ADD COLUMN {}", column_clause(name, def))
        }
        AlterOperation::ModifyColumn { name, def } => {
            format!("ALTER TABLE {table} MODIFY COLUMN {}", column_clause(name, def))
        }
        AlterOperation::DropColumn { name } => format!("ALTER TABLE {table} DROP COLUMN {name}"),
        AlterOperation::AddForeignKey {
            constraint_name,
            column,
            ref_table,
            ref_col,
        } => format!(
            "ALTER TABLE {table} ADD CONSTRAINT {constraint_name} FOREIGN KEY ({column}) REFERENCES {ref_table}({ref_col}) ON DELETE SET NULL ON UPDATE CASCADE"
        ),
        AlterOperation::DropForeignKey { constraint_name } => {
            format!("ALTER TABLE {table} DROP FOREIGN KEY {constraint_name}")
        }
    }
}

/// `ALTER TABLE` builder. Each `.add_column`/`.modify_column`/... call queues
/// one operation; `.execute` runs them in order against `gateway`, one
/// statement per operation — MySQL gets no round-trip benefit from batching
/// these into one clause list, and keeping them separate lets the caller
/// attach module/phase context to whichever one fails.
///
/// # Examples
///
/// ```
/// use schema_sync_db::schema::alter_table;
///
/// let stmt = alter_table("users").drop_column("legacy_flag");
/// assert_eq!(stmt.statements(), vec!["ALTER TABLE users DROP COLUMN legacy_flag"]);
/// ```
#[must_use]
pub const fn alter_table(table: &str) -> AlterTableStatement<'_> {
    AlterTableStatement {
        table,
        operations: Vec::new(),
    }
}

pub struct AlterTableStatement<'a> {
    table: &'a str,
    operations: Vec<AlterOperation>,
}

impl AlterTableStatement<'_> {
    #[must_use]
    pub fn add_column(mut self, name: impl Into<String>, def: ColumnDef) -> Self {
        self.operations.push(AlterOperation::AddColumn {
            name: name.into(),
            def,
        });
        self
    }

    #[must_use]
    pub fn modify_column(mut self, name: impl Into<String>, def: ColumnDef) -> Self {
        self.operations.push(AlterOperation::ModifyColumn {
            name: name.into(),
            def,
        });
        self
    }

    #[must_use]
    pub fn drop_column(mut self, name: impl Into<String>) -> Self {
        self.operations.push(AlterOperation::DropColumn { name: name.into() });
        self
    }

    #[must_use]
    pub fn add_foreign_key(
        mut self,
        constraint_name: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_col: impl Into<String>,
    ) -> Self {
        self.operations.push(AlterOperation::AddForeignKey {
            constraint_name: constraint_name.into(),
            column: column.into(),
            ref_table: ref_table.into(),
            ref_col: ref_col.into(),
        });
        self
    }

    #[must_use]
    pub fn drop_foreign_key(mut self, constraint_name: impl Into<String>) -> Self {
        self.operations.push(AlterOperation::DropForeignKey {
            constraint_name: constraint_name.into(),
        });
        self
    }

    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| render_alter_operation(self.table, op))
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error on the first operation whose statement fails.
    pub async fn execute(self, gateway: &dyn Gateway) -> GatewayResult<()> {
        for statement in self.statements() {
            gateway.execute(&statement).await?;
        }
        Ok(())
    }
}

/// `CREATE INDEX` builder. Use [`create_index`] to construct.
///
/// # Examples
///
/// ```
/// use schema_sync_db::schema::create_index;
///
/// let stmt = create_index("users_email").table("users").column("email").unique(true);
/// assert_eq!(
///     stmt.statement(),
///     "ALTER TABLE users ADD UNIQUE INDEX users_email (email) USING BTREE"
/// );
/// ```
#[must_use]
pub const fn create_index(index_name: &str) -> CreateIndexStatement<'_> {
    CreateIndexStatement {
        index_name,
        table_name: "",
        column: "",
        kind: IndexKind::Index,
        algorithm: IndexAlgorithm::Btree,
    }
}

pub struct CreateIndexStatement<'a> {
    index_name: &'a str,
    table_name: &'a str,
    column: &'a str,
    kind: IndexKind,
    algorithm: IndexAlgorithm,
}

impl<'a> CreateIndexStatement<'a> {
    #[must_use]
    pub const fn table(mut self, table_name: &'a str) -> Self {
        self.table_name = table_name;
        self
    }

    #[must_use]
    pub const fn column(mut self, column: &'a str) -> Self {
        self.column = column;
        self
    }

    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.kind = if unique { IndexKind::Unique } else { IndexKind::Index };
        self
    }

    #[must_use]
    pub const fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn algorithm(mut self, algorithm: IndexAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn statement(&self) -> String {
        render_add_index(self.table_name, self.index_name, self.kind, self.column, self.algorithm)
    }

    /// # Errors
    ///
    /// Returns an error if the underlying `ALTER TABLE ADD INDEX` fails.
    pub async fn execute(self, gateway: &dyn Gateway) -> GatewayResult<()> {
        gateway.execute(&self.statement()).await
    }
}

/// `DROP INDEX` builder (rendered as `ALTER TABLE ... DROP INDEX` for
/// MySQL). Use [`drop_index`] to construct.
#[must_use]
pub const fn drop_index<'a>(index_name: &'a str, table_name: &'a str) -> DropIndexStatement<'a> {
    DropIndexStatement { index_name, table_name }
}

pub struct DropIndexStatement<'a> {
    index_name: &'a str,
    table_name: &'a str,
}

impl DropIndexStatement<'_> {
    #[must_use]
    pub fn statement(&self) -> String {
        format!("ALTER TABLE {} DROP INDEX {}", self.table_name, self.index_name)
    }

    /// # Errors
    ///
    /// Returns an error if the underlying `ALTER TABLE DROP INDEX` fails.
    pub async fn execute(self, gateway: &dyn Gateway) -> GatewayResult<()> {
        gateway.execute(&self.statement()).await
    }
}

/// `DROP TABLE` builder. Use [`drop_table`] to construct; `.tables(...)`
/// extends the list so a whole batch of orphans can be dropped in one
/// round trip.
#[must_use]
pub fn drop_table(table_name: &str) -> DropTableStatement<'_> {
    DropTableStatement {
        table_names: vec![table_name],
        if_exists: false,
    }
}

pub struct DropTableStatement<'a> {
    table_names: Vec<&'a str>,
    if_exists: bool,
}

impl<'a> DropTableStatement<'a> {
    #[must_use]
    pub fn tables(mut self, more: impl IntoIterator<Item = &'a str>) -> Self {
        self.table_names.extend(more);
        self
    }

    #[must_use]
    pub const fn if_exists(mut self, if_exists: bool) -> Self {
        self.if_exists = if_exists;
        self
    }

    #[must_use]
    pub fn statement(&self) -> String {
        let keyword = if self.if_exists { "DROP TABLE IF EXISTS" } else { "DROP TABLE" };
        format!("{keyword} {}", self.table_names.join(","))
    }

    /// # Errors
    ///
    /// Returns an error if the underlying `DROP TABLE` fails.
    pub async fn execute(self, gateway: &dyn Gateway) -> GatewayResult<()> {
        gateway.execute(&self.statement()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_clause_null_default_only_when_nullable() {
        let nullable = ColumnDef::new("bigint", true).with_length("20");
        assert_eq!(
            column_clause("example_one_big_int", &nullable),
            "example_one_big_int bigint(20) DEFAULT NULL"
        );

        let not_nullable = ColumnDef::new("bigint", false).with_length("20");
        assert_eq!(
            column_clause("col", &not_nullable),
            "col bigint(20) NOT NULL"
        );
    }

    #[test]
    fn column_clause_current_timestamp_is_unquoted() {
        let locking = ColumnDef::new("datetime", false)
            .with_default(ColumnDefault::CurrentTimestamp);
        assert_eq!(
            column_clause("last_updated", &locking),
            "last_updated datetime NOT NULL DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn create_table_skeleton_has_only_primary_key() {
        let stmt = create_table("example_entity_one").primary_key("id");
        assert_eq!(
            stmt.statement(),
            "CREATE TABLE example_entity_one(id BIGINT NOT NULL AUTO_INCREMENT, PRIMARY KEY(id))"
        );
    }

    #[test]
    fn add_index_uses_explicit_algorithm() {
        let stmt = create_index("example_entity_one_example_one_big_int")
            .table("example_entity_one")
            .column("example_one_big_int")
            .kind(IndexKind::Index)
            .algorithm(IndexAlgorithm::Btree);
        assert_eq!(
            stmt.statement(),
            "ALTER TABLE example_entity_one ADD INDEX example_entity_one_example_one_big_int (example_one_big_int) USING BTREE"
        );
    }

    #[test]
    fn modify_column_renders_nullable_default() {
        let def = ColumnDef::new("varchar", true).with_length("50");
        let stmt = alter_table("example_entity_one").modify_column("example_one_string_with_null", def);
        assert_eq!(
            stmt.statements(),
            vec!["ALTER TABLE example_entity_one MODIFY COLUMN example_one_string_with_null varchar(50) DEFAULT NULL"]
        );
    }

    #[test]
    fn spatial_and_fulltext_omit_using_clause() {
        let stmt = create_index("idx_geo").table("t").column("geo").kind(IndexKind::Spatial);
        assert_eq!(stmt.statement(), "ALTER TABLE t ADD SPATIAL INDEX idx_geo (geo)");
    }

    #[test]
    fn foreign_key_fragments() {
        let add = alter_table("t2").add_foreign_key("a1b2c3", "owner_id", "t1", "id");
        assert_eq!(
            add.statements(),
            vec!["ALTER TABLE t2 ADD CONSTRAINT a1b2c3 FOREIGN KEY (owner_id) REFERENCES t1(id) ON DELETE SET NULL ON UPDATE CASCADE"]
        );

        let drop = alter_table("app.t2").drop_foreign_key("a1b2c3");
        assert_eq!(drop.statements(), vec!["ALTER TABLE app.t2 DROP FOREIGN KEY a1b2c3"]);
    }

    #[test]
    fn drop_table_batches_multiple_names() {
        let stmt = drop_table("a").tables(["b", "c"]);
        assert_eq!(stmt.statement(), "DROP TABLE a,b,c");
    }

    #[test]
    fn drop_index_renders_alter_table_form() {
        let stmt = drop_index("idx_email", "users");
        assert_eq!(stmt.statement(), "ALTER TABLE users DROP INDEX idx_email");
    }
}
