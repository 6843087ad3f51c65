//! Row types returned by [`crate::gateway::Gateway`] introspection calls and
//! the `information_schema` queries that populate them.
//!
//! Four `information_schema` tables cover it: `TABLES`, `COLUMNS`,
//! `STATISTICS`, and `KEY_COLUMN_USAGE` joined with
//! `REFERENTIAL_CONSTRAINTS`. Every query is schema-scoped and accumulates
//! row-by-row into a `Vec`, which the engine then turns into sets.

use sqlx::{Row, mysql::MySqlRow};

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub name: String,
    pub table_type: String,
}

/// One row of `SHOW FULL COLUMNS`-equivalent data. `column_type` is the
/// full MySQL type token (e.g. `"varchar(50)"`, `"bigint(20)"`) — splitting
/// it at the first `(` into `(type, lengthOrValues)` is the column
/// reconciliation algorithm's job, not the gateway's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub field: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub is_primary_key: bool,
    pub ordinal_position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_update: String,
    pub on_delete: String,
}

pub(crate) async fn list_tables(
    conn: &mut sqlx::MySqlConnection,
    schema: &str,
) -> GatewayResult<Vec<TableSummary>> {
    let rows = sqlx::query(
        "SELECT TABLE_NAME, TABLE_TYPE FROM information_schema.TABLES WHERE TABLE_SCHEMA = ?",
    )
    .bind(schema)
    .fetch_all(&mut *conn)
    .await
    .map_err(|source| GatewayError::Introspection {
        schema: schema.to_string(),
        table: String::new(),
        source,
    })?;

    Ok(rows
        .iter()
        .map(|row: &MySqlRow| TableSummary {
            name: row.get("TABLE_NAME"),
            table_type: row.get("TABLE_TYPE"),
        })
        .collect())
}

/// Builds a [`ColumnInfo`] from the already-extracted scalar fields of one
/// `COLUMNS`/`KEY_COLUMN_USAGE` join row — split out from [`list_columns`]
/// so the mapping can be unit-tested without a live `MySqlRow`.
fn map_column_row(
    field: String,
    column_type: String,
    is_nullable: &str,
    default: Option<String>,
    ordinal_position: u32,
    is_pk: i64,
) -> ColumnInfo {
    ColumnInfo {
        field,
        column_type,
        nullable: is_nullable == "YES",
        default,
        is_primary_key: is_pk != 0,
        ordinal_position,
    }
}

pub(crate) async fn list_columns(
    conn: &mut sqlx::MySqlConnection,
    schema: &str,
    table: &str,
) -> GatewayResult<Vec<ColumnInfo>> {
    let rows = sqlx::query(
        "SELECT c.COLUMN_NAME, c.COLUMN_TYPE, c.IS_NULLABLE, c.COLUMN_DEFAULT, \
                c.ORDINAL_POSITION, \
                (k.COLUMN_NAME IS NOT NULL) AS IS_PK \
         FROM information_schema.COLUMNS c \
         LEFT JOIN information_schema.KEY_COLUMN_USAGE k \
                ON k.TABLE_SCHEMA = c.TABLE_SCHEMA \
               AND k.TABLE_NAME = c.TABLE_NAME \
               AND k.COLUMN_NAME = c.COLUMN_NAME \
               AND k.CONSTRAINT_NAME = 'PRIMARY' \
         WHERE c.TABLE_SCHEMA = ? AND c.TABLE_NAME = ? \
         ORDER BY c.ORDINAL_POSITION",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|source| GatewayError::Introspection {
        schema: schema.to_string(),
        table: table.to_string(),
        source,
    })?;

    Ok(rows
        .iter()
        .map(|row: &MySqlRow| {
            map_column_row(
                row.get("COLUMN_NAME"),
                row.get("COLUMN_TYPE"),
                &row.get::<String, _>("IS_NULLABLE"),
                row.get("COLUMN_DEFAULT"),
                row.get::<u32, _>("ORDINAL_POSITION"),
                row.get::<i64, _>("IS_PK"),
            )
        })
        .collect())
}

pub(crate) async fn list_indexes(
    conn: &mut sqlx::MySqlConnection,
    schema: &str,
    table: &str,
) -> GatewayResult<Vec<IndexInfo>> {
    let rows = sqlx::query(
        "SELECT INDEX_NAME, NON_UNIQUE, COLUMN_NAME \
         FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
         ORDER BY INDEX_NAME, SEQ_IN_INDEX",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|source| GatewayError::Introspection {
        schema: schema.to_string(),
        table: table.to_string(),
        source,
    })?;

    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in &rows {
        push_index_row(
            &mut indexes,
            row.get("INDEX_NAME"),
            row.get::<i64, _>("NON_UNIQUE"),
            row.get("COLUMN_NAME"),
        );
    }
    Ok(indexes)
}

/// Folds one `STATISTICS` row into `indexes`, grouping by index name the
/// way `information_schema` reports multi-column indexes as one row per
/// `(index, column)` pair ordered by `SEQ_IN_INDEX`.
fn push_index_row(indexes: &mut Vec<IndexInfo>, name: String, non_unique: i64, column: String) {
    if let Some(existing) = indexes.iter_mut().find(|i| i.name == name) {
        existing.columns.push(column);
    } else {
        indexes.push(IndexInfo {
            name,
            unique: non_unique == 0,
            columns: vec![column],
        });
    }
}

pub(crate) async fn list_foreign_keys(
    conn: &mut sqlx::MySqlConnection,
    schema: &str,
    table: &str,
) -> GatewayResult<Vec<ForeignKeyInfo>> {
    let rows = sqlx::query(
        "SELECT kcu.CONSTRAINT_NAME, kcu.COLUMN_NAME, kcu.REFERENCED_TABLE_NAME, \
                kcu.REFERENCED_COLUMN_NAME, rc.UPDATE_RULE, rc.DELETE_RULE \
         FROM information_schema.KEY_COLUMN_USAGE kcu \
         JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
              ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
             AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
         WHERE kcu.TABLE_SCHEMA = ? AND kcu.TABLE_NAME = ? \
           AND kcu.REFERENCED_TABLE_NAME IS NOT NULL",
    )
    .bind(schema)
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|source| GatewayError::Introspection {
        schema: schema.to_string(),
        table: table.to_string(),
        source,
    })?;

    Ok(rows.iter().map(map_foreign_key_row).collect())
}

fn map_foreign_key_row(row: &MySqlRow) -> ForeignKeyInfo {
    ForeignKeyInfo {
        constraint_name: row.get("CONSTRAINT_NAME"),
        column: row.get("COLUMN_NAME"),
        referenced_table: row.get("REFERENCED_TABLE_NAME"),
        referenced_column: row.get("REFERENCED_COLUMN_NAME"),
        on_update: row.get("UPDATE_RULE"),
        on_delete: row.get("DELETE_RULE"),
    }
}

/// MySQL reports the engine name case-insensitively (`InnoDB`, `innodb`,
/// `INNODB` have all been observed across versions/configs).
fn is_innodb_engine_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("InnoDB")
}

pub(crate) async fn default_storage_engine_is_innodb(
    conn: &mut sqlx::MySqlConnection,
    schema: &str,
) -> GatewayResult<bool> {
    let row = sqlx::query("SELECT @@default_storage_engine AS engine")
        .fetch_one(&mut *conn)
        .await
        .map_err(|source| GatewayError::Introspection {
            schema: schema.to_string(),
            table: String::new(),
            source,
        })?;
    let engine: String = row.get("engine");
    Ok(is_innodb_engine_name(&engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn map_column_row_detects_nullable_and_primary_key() {
        let col = map_column_row(
            "id".to_string(),
            "bigint(20)".to_string(),
            "NO",
            None,
            1,
            1,
        );
        assert_eq!(col.field, "id");
        assert!(!col.nullable);
        assert!(col.is_primary_key);

        let col = map_column_row(
            "name".to_string(),
            "varchar(50)".to_string(),
            "YES",
            Some("NULL".to_string()),
            2,
            0,
        );
        assert!(col.nullable);
        assert!(!col.is_primary_key);
        assert_eq!(col.default.as_deref(), Some("NULL"));
    }

    #[test]
    fn push_index_row_groups_multi_column_indexes() {
        let mut indexes = Vec::new();
        push_index_row(&mut indexes, "idx_name".to_string(), 1, "first".to_string());
        push_index_row(&mut indexes, "idx_name".to_string(), 1, "second".to_string());
        push_index_row(&mut indexes, "PRIMARY".to_string(), 0, "id".to_string());

        assert_eq!(indexes.len(), 2);
        let idx_name = indexes.iter().find(|i| i.name == "idx_name").unwrap();
        assert_eq!(idx_name.columns, vec!["first", "second"]);
        assert!(!idx_name.unique);
        let primary = indexes.iter().find(|i| i.name == "PRIMARY").unwrap();
        assert!(primary.unique);
    }

    #[test]
    fn is_innodb_engine_name_is_case_insensitive() {
        assert!(is_innodb_engine_name("InnoDB"));
        assert!(is_innodb_engine_name("INNODB"));
        assert!(is_innodb_engine_name("innodb"));
        assert!(!is_innodb_engine_name("MyISAM"));
    }
}
