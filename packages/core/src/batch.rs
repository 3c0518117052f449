//! §4.4 Batch Engine — an ordered list of operations executed inside a
//! single transaction. Any failure rolls back the whole batch and returns
//! the first error; all builders come from the same [`crate::executor`]
//! entry points used by the non-batch path.

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::instrument;

use crate::config::GatewayConfig;
use crate::db::DbError;
use crate::error::GatewayError;
use crate::executor::QueryExecutor;
use crate::schema::SchemaSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperationKind {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchOperation {
    pub operation: BatchOperationKind,
    pub table: String,
    #[serde(default)]
    pub body: JsonValue,
}

/// Runs `operations` against `conn` inside `BEGIN TRANSACTION` / `COMMIT`,
/// mirroring the teacher's `db_batch_create_nodes` rollback-on-error shape.
#[instrument(skip(conn, schema, config, operations))]
pub async fn run_batch(
    conn: &libsql::Connection,
    schema: &SchemaSnapshot,
    config: &GatewayConfig,
    operations: &[BatchOperation],
    guard_reserved_tables: bool,
) -> Result<Vec<JsonValue>, GatewayError> {
    if operations.len() > config.max_batch_operations {
        return Err(GatewayError::BatchTooLarge {
            size: operations.len(),
            max: config.max_batch_operations,
        });
    }

    conn.execute("BEGIN TRANSACTION", ())
        .await
        .map_err(|e| GatewayError::from(DbError::sql_execution(format!("failed to begin transaction: {e}"))))?;

    let executor = QueryExecutor::new(conn, schema, config, guard_reserved_tables);
    let mut results = Vec::with_capacity(operations.len());

    for op in operations {
        match apply_operation(&executor, op).await {
            Ok(value) => results.push(value),
            Err(err) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                return Err(err);
            }
        }
    }

    conn.execute("COMMIT", ())
        .await
        .map_err(|e| {
            let _ = conn.execute("ROLLBACK", ());
            GatewayError::from(DbError::sql_execution(format!("failed to commit batch: {e}")))
        })?;

    Ok(results)
}

async fn apply_operation(
    executor: &QueryExecutor<'_>,
    op: &BatchOperation,
) -> Result<JsonValue, GatewayError> {
    match op.operation {
        BatchOperationKind::Select => {
            let select_items = array_field(&op.body, "select");
            let where_items = array_field(&op.body, "where");
            let order_map = object_field(&op.body, "order");
            let limit = op.body.get("limit").and_then(JsonValue::as_i64);
            let offset = op.body.get("offset").and_then(JsonValue::as_i64);
            let count_exact = op
                .body
                .get("count")
                .and_then(JsonValue::as_str)
                .map(|v| v == "exact")
                .unwrap_or(false);

            let (data, total_count) = executor
                .select(&op.table, &select_items, &where_items, &order_map, limit, offset, count_exact)
                .await?;
            match total_count {
                Some(count) => Ok(serde_json::json!({ "data": data, "count": count })),
                None => Ok(data),
            }
        }
        BatchOperationKind::Insert => {
            let rows = rows_field(&op.body)?;
            let returning = string_array_field(&op.body, "returning");
            let ignore = op
                .body
                .get("ignore")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            executor.insert(&op.table, &rows, &returning, ignore).await
        }
        BatchOperationKind::Upsert => {
            let rows = rows_field(&op.body)?;
            executor.upsert(&op.table, &rows).await
        }
        BatchOperationKind::Update => {
            let data = op
                .body
                .get("data")
                .and_then(JsonValue::as_object)
                .cloned()
                .ok_or_else(|| GatewayError::internal("update batch op requires a data object"))?;
            let where_items = array_field(&op.body, "where");
            executor.update(&op.table, &data, &where_items).await
        }
        BatchOperationKind::Delete => {
            let where_items = array_field(&op.body, "where");
            executor.delete(&op.table, &where_items).await
        }
    }
}

pub(crate) fn array_field(body: &JsonValue, key: &str) -> Vec<JsonValue> {
    body.get(key)
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn string_array_field(body: &JsonValue, key: &str) -> Vec<String> {
    body.get(key)
        .and_then(JsonValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn object_field(body: &JsonValue, key: &str) -> Map<String, JsonValue> {
    body.get(key)
        .and_then(JsonValue::as_object)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn rows_field(body: &JsonValue) -> Result<Vec<Map<String, JsonValue>>, GatewayError> {
    let raw = body
        .get("data")
        .ok_or_else(|| GatewayError::internal("insert/upsert batch op requires a data field"))?;
    match raw {
        JsonValue::Array(items) => items
            .iter()
            .map(|v| {
                v.as_object()
                    .cloned()
                    .ok_or_else(|| GatewayError::internal("batch row must be a JSON object"))
            })
            .collect(),
        JsonValue::Object(obj) => Ok(vec![obj.clone()]),
        _ => Err(GatewayError::internal("batch data must be an object or array of objects")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_operation_kinds() {
        let op: BatchOperation = serde_json::from_value(serde_json::json!({
            "operation": "update",
            "table": "t",
            "body": { "data": { "value": 100 }, "where": [{ "id": { "eq": 999 } }] }
        }))
        .unwrap();
        assert_eq!(op.operation, BatchOperationKind::Update);
        assert_eq!(op.table, "t");
    }

    #[test]
    fn rows_field_accepts_single_object_or_array() {
        let single = serde_json::json!({ "data": { "a": 1 } });
        assert_eq!(rows_field(&single).unwrap().len(), 1);

        let many = serde_json::json!({ "data": [{ "a": 1 }, { "a": 2 }] });
        assert_eq!(rows_field(&many).unwrap().len(), 2);
    }
}
