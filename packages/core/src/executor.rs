//! §4.3 "Execution" — binds compiled SQL to a connection, scans rows, and
//! returns JSON bytes via SQLite's native JSON functions rather than
//! row-by-row marshaling.

use serde_json::{Map, Value as JsonValue};
use tracing::instrument;

use crate::config::GatewayConfig;
use crate::db::DbError;
use crate::error::GatewayError;
use crate::query::value::json_values_to_params;
use crate::query::{filter, order, pagination, returning, select};
use crate::schema::SchemaSnapshot;
use crate::tenant::TenantRegistry;
use crate::validator::{bracket, validate_identifier};

pub struct QueryExecutor<'a> {
    conn: &'a libsql::Connection,
    schema: &'a SchemaSnapshot,
    config: &'a GatewayConfig,
    /// The reserved-table guard (§4.3) only applies to the primary
    /// database, where the tenant/template registry tables live.
    guard_reserved_tables: bool,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(
        conn: &'a libsql::Connection,
        schema: &'a SchemaSnapshot,
        config: &'a GatewayConfig,
        guard_reserved_tables: bool,
    ) -> Self {
        Self {
            conn,
            schema,
            config,
            guard_reserved_tables,
        }
    }

    fn check_not_reserved(&self, table: &str) -> Result<(), GatewayError> {
        if self.guard_reserved_tables
            && TenantRegistry::is_reserved_table(table, &self.config.internal_table_prefix)
        {
            return Err(GatewayError::ReservedTable {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, select_items, where_items, order_map))]
    pub async fn select(
        &self,
        table: &str,
        select_items: &[JsonValue],
        where_items: &[JsonValue],
        order_map: &Map<String, JsonValue>,
        limit: Option<i64>,
        offset: Option<i64>,
        count_exact: bool,
    ) -> Result<(JsonValue, Option<i64>), GatewayError> {
        validate_identifier(table)?;
        self.check_not_reserved(table)?;
        self.schema.find_table(table)?;

        let tree = select::parse_select(table, select_items, self.schema, self.config.max_query_depth)?;
        let (where_sql, where_params) = filter::build_where(
            where_items,
            table,
            self.schema,
            &self.config.fts_suffix,
        )?;
        let order_sql = order::build_order(order_map, table, self.schema)?;
        let pagination = pagination::clamp(
            limit,
            offset,
            self.config.max_query_limit,
            self.config.default_limit,
        );

        let compiled = select::build_select(&tree, self.schema, &where_sql, &order_sql, pagination)?;
        let bound = json_values_to_params(&where_params);

        let total_count = if count_exact {
            let mut stmt = self
                .conn
                .prepare(&compiled.count_sql)
                .await
                .map_err(DbError::from)?;
            let mut rows = stmt
                .query(bound.clone())
                .await
                .map_err(DbError::from)?;
            match rows.next().await.map_err(DbError::from)? {
                Some(row) => Some(row.get::<i64>(0).map_err(DbError::from)?),
                None => Some(0),
            }
        } else {
            None
        };

        let mut stmt = self
            .conn
            .prepare(&compiled.data_sql)
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt.query(bound).await.map_err(DbError::from)?;

        let data = match rows.next().await.map_err(DbError::from)? {
            Some(row) => {
                let text: String = row.get(0).map_err(DbError::from)?;
                serde_json::from_str(&text)?
            }
            None => JsonValue::Array(Vec::new()),
        };

        Ok((data, total_count))
    }

    #[instrument(skip(self, rows, returning_cols))]
    pub async fn insert(
        &self,
        table: &str,
        rows: &[Map<String, JsonValue>],
        returning_cols: &[String],
        ignore: bool,
    ) -> Result<JsonValue, GatewayError> {
        self.check_not_reserved(table)?;
        validate_identifier(table)?;
        self.schema.find_table(table)?;

        let first = rows
            .first()
            .ok_or_else(|| GatewayError::internal("insert requires at least one row"))?;
        let columns: Vec<&String> = first.keys().collect();
        for column in &columns {
            validate_identifier(column)?;
            self.schema.find_column(table, column)?;
        }

        let or_ignore = if ignore { " OR IGNORE" } else { "" };
        let column_list = columns
            .iter()
            .map(|c| bracket(c))
            .collect::<Vec<_>>()
            .join(", ");
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let values_sql = vec![row_placeholders; rows.len()].join(", ");
        let returning_sql = returning::build_returning(returning_cols, table, self.schema)?;

        let sql = format!(
            "INSERT{or_ignore} INTO {} ({column_list}) VALUES {values_sql}{}{returning_sql}",
            bracket(table),
            if returning_sql.is_empty() { "" } else { " " }
        );

        let mut params = Vec::new();
        for row in rows {
            for column in &columns {
                let value = row.get(*column).cloned().unwrap_or(JsonValue::Null);
                params.push(value);
            }
        }
        let bound = json_values_to_params(&params);

        if !returning_sql.is_empty() {
            let mut stmt = self.conn.prepare(&sql).await.map_err(DbError::from)?;
            let mut query_rows = stmt.query(bound).await.map_err(DbError::from)?;
            let mut results = Vec::new();
            while let Some(row) = query_rows.next().await.map_err(DbError::from)? {
                results.push(row_to_json(&row, returning_cols, table, self.schema)?);
            }
            return Ok(JsonValue::Array(results));
        }

        let rows_affected = self.conn.execute(&sql, bound).await.map_err(DbError::from)?;

        if ignore {
            Ok(serde_json::json!({ "rows_affected": rows_affected }))
        } else {
            Ok(serde_json::json!({ "last_insert_id": self.conn.last_insert_rowid() }))
        }
    }

    #[instrument(skip(self, rows))]
    pub async fn upsert(
        &self,
        table: &str,
        rows: &[Map<String, JsonValue>],
    ) -> Result<JsonValue, GatewayError> {
        self.check_not_reserved(table)?;
        validate_identifier(table)?;
        let table_schema = self.schema.find_table(table)?;

        let first = rows
            .first()
            .ok_or_else(|| GatewayError::internal("upsert requires at least one row"))?;
        let columns: Vec<String> = first.keys().cloned().collect();
        for column in &columns {
            validate_identifier(column)?;
            self.schema.find_column(table, column)?;
        }
        for row in rows {
            let row_keys: std::collections::HashSet<&String> = row.keys().collect();
            let expected: std::collections::HashSet<&String> = columns.iter().collect();
            if row_keys != expected {
                return Err(GatewayError::internal(
                    "all upsert rows must share the same key set as row 0",
                ));
            }
        }

        let column_list = columns.iter().map(|c| bracket(c)).collect::<Vec<_>>().join(", ");
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let values_sql = vec![row_placeholders; rows.len()].join(", ");
        let conflict_col = table_schema.row_identity_column();
        let update_set = columns
            .iter()
            .map(|c| format!("{} = excluded.{}", bracket(c), bracket(c)))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES {values_sql} ON CONFLICT({}) DO UPDATE SET {update_set}",
            bracket(table),
            bracket(conflict_col),
        );

        let mut params = Vec::new();
        for row in rows {
            for column in &columns {
                params.push(row.get(column).cloned().unwrap_or(JsonValue::Null));
            }
        }
        let bound = json_values_to_params(&params);

        let rows_affected = self.conn.execute(&sql, bound).await.map_err(DbError::from)?;
        Ok(serde_json::json!({ "rows_affected": rows_affected }))
    }

    #[instrument(skip(self, data, where_items))]
    pub async fn update(
        &self,
        table: &str,
        data: &Map<String, JsonValue>,
        where_items: &[JsonValue],
    ) -> Result<JsonValue, GatewayError> {
        self.check_not_reserved(table)?;
        validate_identifier(table)?;
        self.schema.find_table(table)?;

        if where_items.is_empty() {
            return Err(GatewayError::missing_where_clause(table));
        }

        let mut set_fragments = Vec::new();
        let mut params = Vec::new();
        for (column, value) in data {
            validate_identifier(column)?;
            self.schema.find_column(table, column)?;
            set_fragments.push(format!("{} = ?", bracket(column)));
            params.push(value.clone());
        }

        let (where_sql, mut where_params) =
            filter::build_where(where_items, table, self.schema, &self.config.fts_suffix)?;
        params.append(&mut where_params);

        let sql = format!(
            "UPDATE {} SET {} WHERE {where_sql}",
            bracket(table),
            set_fragments.join(", ")
        );

        let bound = json_values_to_params(&params);
        let rows_affected = self.conn.execute(&sql, bound).await.map_err(DbError::from)?;
        Ok(serde_json::json!({ "rows_affected": rows_affected }))
    }

    #[instrument(skip(self, where_items))]
    pub async fn delete(&self, table: &str, where_items: &[JsonValue]) -> Result<JsonValue, GatewayError> {
        self.check_not_reserved(table)?;
        validate_identifier(table)?;
        self.schema.find_table(table)?;

        if where_items.is_empty() {
            return Err(GatewayError::missing_where_clause(table));
        }

        let (where_sql, where_params) =
            filter::build_where(where_items, table, self.schema, &self.config.fts_suffix)?;
        let sql = format!("DELETE FROM {} WHERE {where_sql}", bracket(table));
        let bound = json_values_to_params(&where_params);

        let rows_affected = self.conn.execute(&sql, bound).await.map_err(DbError::from)?;
        Ok(serde_json::json!({ "rows_affected": rows_affected }))
    }

    pub async fn execute_ddl(&self, sql: &str) -> Result<(), GatewayError> {
        crate::validator::validate_ddl_query(sql)?;
        self.conn.execute(sql, ()).await.map_err(DbError::from)?;
        Ok(())
    }
}

fn row_to_json(
    row: &libsql::Row,
    returning_cols: &[String],
    table: &str,
    schema: &SchemaSnapshot,
) -> Result<JsonValue, GatewayError> {
    let cols: Vec<String> = if returning_cols.len() == 1 && returning_cols[0] == "*" {
        schema
            .find_table(table)?
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect()
    } else {
        returning_cols.to_vec()
    };

    let mut obj = Map::new();
    for (idx, col) in cols.iter().enumerate() {
        let value: JsonValue = match row.get::<libsql::Value>(idx as i32) {
            Ok(libsql::Value::Null) => JsonValue::Null,
            Ok(libsql::Value::Integer(i)) => JsonValue::Number(i.into()),
            Ok(libsql::Value::Real(f)) => serde_json::Number::from_f64(f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Ok(libsql::Value::Text(s)) => JsonValue::String(s),
            Ok(libsql::Value::Blob(_)) => JsonValue::Null,
            Err(e) => return Err(DbError::from(e).into()),
        };
        obj.insert(col.clone(), value);
    }
    Ok(JsonValue::Object(obj))
}
