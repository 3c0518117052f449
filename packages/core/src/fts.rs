//! §4.5 FTS Controller — creates/drops an FTS5 shadow table plus the three
//! triggers that mirror it against INSERT/UPDATE/DELETE on the base table.
//! Operates on an already-acquired connection + schema snapshot, the same
//! shape `QueryExecutor` takes, so it works against either the primary or a
//! daughter; callers refresh the relevant schema cache afterward.

use tracing::{info, instrument};

use crate::db::DbError;
use crate::error::GatewayError;
use crate::schema::{ColumnType, SchemaSnapshot};
use crate::validator::{bracket, validate_identifier};

fn fts_table_name(table: &str) -> String {
    format!("{table}{}", crate::FTS_TABLE_SUFFIX)
}

fn trigger_name(table: &str, kind: &str) -> String {
    format!("{table}{}_{kind}", crate::FTS_TABLE_SUFFIX)
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Creates `<table>_fts`, backfills it, and wires up the three mirror
/// triggers. Fails if the table already has a registered FTS index, or if
/// any requested column is missing or not TEXT.
#[instrument(skip(conn, schema, columns))]
pub async fn create_fts_index(
    conn: &libsql::Connection,
    schema: &SchemaSnapshot,
    table: &str,
    columns: &[String],
) -> Result<(), GatewayError> {
    validate_identifier(table)?;
    for column in columns {
        validate_identifier(column)?;
    }

    if schema.has_fts_index(table) {
        return Err(GatewayError::internal(format!(
            "FTS index already exists for table: {table}"
        )));
    }

    let table_schema = schema.find_table(table)?;
    for column in columns {
        let col = table_schema
            .column(column)
            .ok_or_else(|| GatewayError::column_not_found(table, column))?;
        if col.column_type != ColumnType::Text {
            return Err(GatewayError::InvalidColumnType {
                column: column.clone(),
                expected: "TEXT".to_string(),
            });
        }
    }

    let fts_table = fts_table_name(table);
    let bracketed_cols = columns.iter().map(|c| bracket(c)).collect::<Vec<_>>().join(", ");
    let new_values = columns.iter().map(|c| format!("new.{}", bracket(c))).collect::<Vec<_>>().join(", ");
    let old_values = columns.iter().map(|c| format!("old.{}", bracket(c))).collect::<Vec<_>>().join(", ");

    conn.execute(
        &format!(
            "CREATE VIRTUAL TABLE {} USING fts5({bracketed_cols}, content={}, content_rowid='rowid')",
            bracket(&fts_table),
            quoted(table),
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "INSERT INTO {}(rowid, {bracketed_cols}) SELECT rowid, {bracketed_cols} FROM {}",
            bracket(&fts_table),
            bracket(table),
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "CREATE TRIGGER {} AFTER INSERT ON {} BEGIN
                INSERT INTO {}(rowid, {bracketed_cols}) VALUES (new.rowid, {new_values});
            END",
            bracket(&trigger_name(table, "insert")),
            bracket(table),
            bracket(&fts_table),
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "CREATE TRIGGER {} AFTER DELETE ON {} BEGIN
                INSERT INTO {}({}, rowid, {bracketed_cols}) VALUES ('delete', old.rowid, {old_values});
            END",
            bracket(&trigger_name(table, "delete")),
            bracket(table),
            bracket(&fts_table),
            bracket(&fts_table),
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "CREATE TRIGGER {} AFTER UPDATE ON {} BEGIN
                INSERT INTO {}({}, rowid, {bracketed_cols}) VALUES ('delete', old.rowid, {old_values});
                INSERT INTO {}(rowid, {bracketed_cols}) VALUES (new.rowid, {new_values});
            END",
            bracket(&trigger_name(table, "update")),
            bracket(table),
            bracket(&fts_table),
            bracket(&fts_table),
            bracket(&fts_table),
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    info!(table, "FTS index created");
    Ok(())
}

/// Drops the three mirror triggers and the shadow table. Fails if no FTS
/// index is recorded for `table`.
#[instrument(skip(conn, schema))]
pub async fn drop_fts_index(
    conn: &libsql::Connection,
    schema: &SchemaSnapshot,
    table: &str,
) -> Result<(), GatewayError> {
    validate_identifier(table)?;

    if !schema.has_fts_index(table) {
        return Err(GatewayError::NoFtsIndex {
            table: table.to_string(),
        });
    }

    for kind in ["insert", "delete", "update"] {
        conn.execute(
            &format!("DROP TRIGGER IF EXISTS {}", bracket(&trigger_name(table, kind))),
            (),
        )
        .await
        .map_err(DbError::from)?;
    }

    conn.execute(
        &format!("DROP TABLE IF EXISTS {}", bracket(&fts_table_name(table))),
        (),
    )
    .await
    .map_err(DbError::from)?;

    info!(table, "FTS index dropped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_table_and_trigger_names() {
        assert_eq!(fts_table_name("articles"), "articles_fts");
        assert_eq!(trigger_name("articles", "insert"), "articles_fts_insert");
    }
}
