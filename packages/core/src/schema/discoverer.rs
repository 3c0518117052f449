//! §4.2 Discovery — rebuilds a `SchemaSnapshot` from a live connection via
//! SQLite system metadata, never by parsing SQL text (see the teacher's
//! `execute_pragma` pattern in `db/database.rs`).

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::error::GatewayError;

use super::model::{Column, ColumnType, DefaultValue, ForeignKey, SchemaSnapshot, Table};

/// Rebuilds a full snapshot: tables/views + columns, foreign keys, and the
/// FTS-indexed base-table set.
#[instrument(skip(conn))]
pub async fn discover_schema(conn: &libsql::Connection) -> Result<SchemaSnapshot, GatewayError> {
    let table_names = discover_table_names(conn).await?;
    let mut tables = std::collections::HashMap::new();
    let mut foreign_keys = std::collections::HashMap::new();

    for name in &table_names {
        let table = discover_table_columns(conn, name).await?;
        tables.insert(name.clone(), table);

        let fks = discover_foreign_keys(conn, name).await?;
        if !fks.is_empty() {
            foreign_keys.insert(name.clone(), fks);
        }
    }

    let fts_indexed_tables = discover_fts_tables(conn).await?;

    debug!(
        tables = tables.len(),
        fks = foreign_keys.len(),
        fts = fts_indexed_tables.len(),
        "rebuilt schema snapshot"
    );

    Ok(SchemaSnapshot {
        tables,
        foreign_keys,
        fts_indexed_tables,
    })
}

async fn discover_table_names(conn: &libsql::Connection) -> Result<Vec<String>, GatewayError> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'")
        .await
        .map_err(crate::db::DbError::from)?;
    let mut rows = stmt.query(()).await.map_err(crate::db::DbError::from)?;

    let mut names = Vec::new();
    while let Some(row) = rows.next().await.map_err(crate::db::DbError::from)? {
        let name: String = row.get(0).map_err(crate::db::DbError::from)?;
        names.push(name);
    }
    Ok(names)
}

async fn discover_table_columns(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Table, GatewayError> {
    let pragma = format!("SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info('{table}')");
    let mut stmt = conn.prepare(&pragma).await.map_err(crate::db::DbError::from)?;
    let mut rows = stmt.query(()).await.map_err(crate::db::DbError::from)?;

    let mut result = Table::new(table);
    while let Some(row) = rows.next().await.map_err(crate::db::DbError::from)? {
        let name: String = row.get(0).map_err(crate::db::DbError::from)?;
        let declared_type: String = row.get(1).map_err(crate::db::DbError::from)?;
        let not_null: i64 = row.get(2).map_err(crate::db::DbError::from)?;
        let default_raw: Option<String> = row.get(3).map_err(crate::db::DbError::from)?;
        let pk_index: i64 = row.get(4).map_err(crate::db::DbError::from)?;

        if pk_index == 1 {
            result.primary_key = Some(name.clone());
        }

        result.columns.push(Column {
            name,
            column_type: ColumnType::from_declared(&declared_type),
            not_null: not_null != 0,
            default: normalize_default(default_raw),
            references: None,
        });
    }
    Ok(result)
}

/// A quoted literal becomes the unquoted string; `NULL`/`null` become the
/// null value; anything else (including `CURRENT_TIMESTAMP` and numeric
/// literals) is kept verbatim as an expression.
fn normalize_default(raw: Option<String>) -> Option<DefaultValue> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Some(DefaultValue::Null);
    }
    let quoted = (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
        || (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2);
    if quoted {
        Some(DefaultValue::Literal(
            trimmed[1..trimmed.len() - 1].to_string(),
        ))
    } else {
        Some(DefaultValue::Expression(trimmed.to_string()))
    }
}

async fn discover_foreign_keys(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Vec<ForeignKey>, GatewayError> {
    let pragma = format!("SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list('{table}')");
    let mut stmt = conn.prepare(&pragma).await.map_err(crate::db::DbError::from)?;
    let mut rows = stmt.query(()).await.map_err(crate::db::DbError::from)?;

    let mut fks = Vec::new();
    while let Some(row) = rows.next().await.map_err(crate::db::DbError::from)? {
        let references_table: String = row.get(0).map_err(crate::db::DbError::from)?;
        let from_column: String = row.get(1).map_err(crate::db::DbError::from)?;
        let to_column: String = row.get(2).map_err(crate::db::DbError::from)?;
        fks.push(ForeignKey {
            table: table.to_string(),
            references_table,
            from_column,
            to_column,
        });
    }
    Ok(fks)
}

/// Tables whose creation SQL mentions `fts5` (case-insensitive substring);
/// the base table name is derived by stripping a trailing `_fts` suffix.
async fn discover_fts_tables(conn: &libsql::Connection) -> Result<HashSet<String>, GatewayError> {
    let mut stmt = conn
        .prepare("SELECT name, sql FROM sqlite_master WHERE type = 'table' AND sql IS NOT NULL")
        .await
        .map_err(crate::db::DbError::from)?;
    let mut rows = stmt.query(()).await.map_err(crate::db::DbError::from)?;

    let mut bases = HashSet::new();
    while let Some(row) = rows.next().await.map_err(crate::db::DbError::from)? {
        let name: String = row.get(0).map_err(crate::db::DbError::from)?;
        let sql: String = row.get(1).map_err(crate::db::DbError::from)?;
        if sql.to_ascii_lowercase().contains("fts5") {
            if let Some(base) = name.strip_suffix(crate::FTS_TABLE_SUFFIX) {
                bases.insert(base.to_string());
            }
        }
    }
    Ok(bases)
}
