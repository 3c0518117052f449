//! §4.3 Order composer. Map of column → `"asc"`|`"desc"` (case-insensitive).

use serde_json::Value as JsonValue;

use crate::error::GatewayError;
use crate::schema::SchemaSnapshot;
use crate::validator::{bracket, validate_identifier};

pub fn build_order(
    order: &serde_json::Map<String, JsonValue>,
    table: &str,
    schema: &SchemaSnapshot,
) -> Result<String, GatewayError> {
    if order.is_empty() {
        return Ok(String::new());
    }

    let mut clauses = Vec::with_capacity(order.len());
    for (column, direction) in order {
        validate_identifier(column)?;
        schema.find_column(table, column)?;

        let direction_str = direction.as_str().ok_or_else(|| GatewayError::InvalidOperator {
            operator: direction.to_string(),
        })?;
        let direction_sql = match direction_str.to_ascii_lowercase().as_str() {
            "asc" => "ASC",
            "desc" => "DESC",
            other => {
                return Err(GatewayError::InvalidOperator {
                    operator: other.to_string(),
                })
            }
        };

        clauses.push(format!(
            "{}.{} {direction_sql}",
            bracket(table),
            bracket(column)
        ));
    }

    Ok(format!("ORDER BY {}", clauses.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Table};
    use serde_json::json;

    #[test]
    fn builds_order_clause() {
        let mut schema = SchemaSnapshot::default();
        let mut users = Table::new("users");
        users.columns.push(Column::new("name", ColumnType::Text));
        schema.tables.insert("users".to_string(), users);

        let order = json!({"name": "DESC"}).as_object().unwrap().clone();
        let sql = build_order(&order, "users", &schema).unwrap();
        assert_eq!(sql, "ORDER BY [users].[name] DESC");
    }

    #[test]
    fn unknown_direction_is_a_client_error_not_an_internal_one() {
        let mut schema = SchemaSnapshot::default();
        let mut users = Table::new("users");
        users.columns.push(Column::new("name", ColumnType::Text));
        schema.tables.insert("users".to_string(), users);

        let order = json!({"name": "sideways"}).as_object().unwrap().clone();
        let err = build_order(&order, "users", &schema).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidOperator { .. }));
        assert_eq!(err.status_code(), 400);
    }
}
