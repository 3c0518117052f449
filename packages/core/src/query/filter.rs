//! §4.3 Where composition. A JSON `where` array is AND-ed together; entries
//! are either `{column: {operator: value}}` or `{or: [...]}`. §9: operator
//! dispatch is a flat switch over a closed set, not polymorphic operator
//! objects.

use serde_json::Value as JsonValue;

use crate::error::GatewayError;
use crate::schema::SchemaSnapshot;
use crate::validator::{bracket, validate_identifier};

use super::value::FilterValue;

/// Builds a `WHERE ...` body (without the `WHERE` keyword) and its bound
/// parameter list from the JSON `where` array.
pub fn build_where(
    items: &[JsonValue],
    table: &str,
    schema: &SchemaSnapshot,
    fts_suffix: &str,
) -> Result<(String, Vec<JsonValue>), GatewayError> {
    let mut fragments = Vec::new();
    let mut params = Vec::new();

    for item in items {
        let obj = item.as_object().ok_or_else(|| {
            GatewayError::internal("where entry must be a JSON object")
        })?;
        let (fragment, mut entry_params) = parse_entry_object(obj, table, schema, fts_suffix)?;
        fragments.push(fragment);
        params.append(&mut entry_params);
    }

    Ok((fragments.join(" AND "), params))
}

/// Parses one JSON object whose keys are AND-ed together (used both for a
/// top-level `where` entry and for each element of an `or` list).
fn parse_entry_object(
    obj: &serde_json::Map<String, JsonValue>,
    table: &str,
    schema: &SchemaSnapshot,
    fts_suffix: &str,
) -> Result<(String, Vec<JsonValue>), GatewayError> {
    let mut fragments = Vec::new();
    let mut params = Vec::new();

    for (key, value) in obj {
        if key == "or" {
            let list = value
                .as_array()
                .ok_or_else(|| GatewayError::internal("'or' requires an array value"))?;
            let mut or_fragments = Vec::new();
            for child in list {
                let child_obj = child
                    .as_object()
                    .ok_or_else(|| GatewayError::internal("'or' entries must be objects"))?;
                let (fragment, mut child_params) =
                    parse_entry_object(child_obj, table, schema, fts_suffix)?;
                or_fragments.push(fragment);
                params.append(&mut child_params);
            }
            fragments.push(format!("({})", or_fragments.join(" OR ")));
            continue;
        }

        let column = key.as_str();
        validate_identifier(column)?;
        schema.find_column(table, column)?;

        let operator_obj = value
            .as_object()
            .ok_or_else(|| GatewayError::internal("operator value must be an object"))?;
        let (fragment, mut op_params) =
            build_column_condition(table, column, operator_obj, schema, fts_suffix)?;
        fragments.push(fragment);
        params.append(&mut op_params);
    }

    Ok((fragments.join(" AND "), params))
}

fn build_column_condition(
    table: &str,
    column: &str,
    operator_obj: &serde_json::Map<String, JsonValue>,
    schema: &SchemaSnapshot,
    fts_suffix: &str,
) -> Result<(String, Vec<JsonValue>), GatewayError> {
    let column_sql = format!("{}.{}", bracket(table), bracket(column));

    if let Some(inner) = operator_obj.get("not") {
        let inner_obj = inner
            .as_object()
            .ok_or_else(|| GatewayError::internal("'not' requires an object value"))?;
        return build_negated_condition(&column_sql, inner_obj);
    }

    let (op, value) = operator_obj
        .iter()
        .next()
        .ok_or_else(|| GatewayError::InvalidOperator {
            operator: String::new(),
        })?;

    apply_operator(&column_sql, op, value, table, schema, fts_suffix)
}

fn build_negated_condition(
    column_sql: &str,
    inner_obj: &serde_json::Map<String, JsonValue>,
) -> Result<(String, Vec<JsonValue>), GatewayError> {
    let (op, value) = inner_obj
        .iter()
        .next()
        .ok_or_else(|| GatewayError::InvalidOperator {
            operator: String::new(),
        })?;

    match op.as_str() {
        "eq" => Ok((
            format!("{column_sql} != ?"),
            FilterValue::Scalar(value.clone()).into_params(),
        )),
        "in" => {
            let list = value
                .as_array()
                .ok_or_else(|| GatewayError::internal("'in' requires an array value"))?;
            let placeholders = std::iter::repeat("?").take(list.len()).collect::<Vec<_>>().join(", ");
            Ok((
                format!("{column_sql} NOT IN ({placeholders})"),
                FilterValue::List(list.clone()).into_params(),
            ))
        }
        "is" => {
            if value.is_null() {
                Ok((format!("{column_sql} IS NOT NULL"), Vec::new()))
            } else {
                Ok((format!("{column_sql} IS NOT {}", literal(value)?), Vec::new()))
            }
        }
        "like" => Ok((
            format!("{column_sql} NOT LIKE ?"),
            FilterValue::Scalar(value.clone()).into_params(),
        )),
        "glob" => Ok((
            format!("{column_sql} NOT GLOB ?"),
            FilterValue::Scalar(value.clone()).into_params(),
        )),
        other => Err(GatewayError::InvalidOperator {
            operator: format!("not.{other}"),
        }),
    }
}

fn apply_operator(
    column_sql: &str,
    op: &str,
    value: &JsonValue,
    table: &str,
    schema: &SchemaSnapshot,
    fts_suffix: &str,
) -> Result<(String, Vec<JsonValue>), GatewayError> {
    match op {
        "eq" => Ok((format!("{column_sql} = ?"), FilterValue::Scalar(value.clone()).into_params())),
        "neq" => Ok((format!("{column_sql} != ?"), FilterValue::Scalar(value.clone()).into_params())),
        "gt" => Ok((format!("{column_sql} > ?"), FilterValue::Scalar(value.clone()).into_params())),
        "gte" => Ok((format!("{column_sql} >= ?"), FilterValue::Scalar(value.clone()).into_params())),
        "lt" => Ok((format!("{column_sql} < ?"), FilterValue::Scalar(value.clone()).into_params())),
        "lte" => Ok((format!("{column_sql} <= ?"), FilterValue::Scalar(value.clone()).into_params())),
        "like" => Ok((format!("{column_sql} LIKE ?"), FilterValue::Scalar(value.clone()).into_params())),
        "glob" => Ok((format!("{column_sql} GLOB ?"), FilterValue::Scalar(value.clone()).into_params())),
        "in" => {
            let list = value
                .as_array()
                .ok_or_else(|| GatewayError::internal("'in' requires an array value"))?;
            let placeholders = std::iter::repeat("?").take(list.len()).collect::<Vec<_>>().join(", ");
            Ok((
                format!("{column_sql} IN ({placeholders})"),
                FilterValue::List(list.clone()).into_params(),
            ))
        }
        "between" => {
            let list = value
                .as_array()
                .ok_or_else(|| GatewayError::internal("'between' requires an array value"))?;
            if list.len() != 2 {
                return Err(GatewayError::internal("'between' requires exactly two values"));
            }
            Ok((
                format!("{column_sql} BETWEEN ? AND ?"),
                FilterValue::List(list.clone()).into_params(),
            ))
        }
        "is" => {
            if value.is_null() {
                Ok((format!("{column_sql} IS NULL"), Vec::new()))
            } else {
                Ok((format!("{column_sql} IS {}", literal(value)?), Vec::new()))
            }
        }
        "fts" => {
            if !schema.has_fts_index(table) {
                return Err(GatewayError::NoFtsIndex {
                    table: table.to_string(),
                });
            }
            let query = value
                .as_str()
                .ok_or_else(|| GatewayError::internal("'fts' requires a string value"))?;
            let fts_table = bracket(&format!("{table}{fts_suffix}"));
            Ok((
                format!(
                    "{}.[rowid] IN (SELECT rowid FROM {fts_table} WHERE {fts_table} MATCH ?)",
                    bracket(table)
                ),
                FilterValue::FtsQuery(query.to_string()).into_params(),
            ))
        }
        other => Err(GatewayError::InvalidOperator {
            operator: other.to_string(),
        }),
    }
}

/// Inlines a non-null scalar as a SQL literal for `IS`/`IS NOT`, which
/// SQLite does not allow as a bound parameter.
fn literal(value: &JsonValue) -> Result<String, GatewayError> {
    match value {
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(if *b { "1".to_string() } else { "0".to_string() }),
        JsonValue::String(s) => Ok(format!("'{}'", crate::validator::escape_literal(s))),
        other => Err(GatewayError::internal(format!(
            "unsupported literal for IS: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Table};
    use serde_json::json;

    fn users_schema() -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::default();
        let mut users = Table::new("users");
        users.primary_key = Some("id".to_string());
        users.columns.push(Column::new("id", ColumnType::Integer));
        users.columns.push(Column::new("status", ColumnType::Text));
        users.columns.push(Column::new("email", ColumnType::Text));
        schema.tables.insert("users".to_string(), users);
        schema
    }

    #[test]
    fn or_and_not_is_null() {
        let schema = users_schema();
        let items = vec![
            json!({"or": [{"status": {"eq": "active"}}, {"status": {"eq": "pending"}}]}),
            json!({"email": {"not": {"is": null}}}),
        ];
        let (sql, params) = build_where(&items, "users", &schema, "_fts").unwrap();
        assert_eq!(
            sql,
            "([users].[status] = ? OR [users].[status] = ?) AND [users].[email] IS NOT NULL"
        );
        assert_eq!(params, vec![json!("active"), json!("pending")]);
    }

    #[test]
    fn fts_requires_index() {
        let schema = users_schema();
        let items = vec![json!({"status": {"fts": "active"}})];
        let err = build_where(&items, "users", &schema, "_fts").unwrap_err();
        assert!(matches!(err, GatewayError::NoFtsIndex { .. }));
    }

    #[test]
    fn unknown_operator_rejected() {
        let schema = users_schema();
        let items = vec![json!({"status": {"bogus": "x"}})];
        let err = build_where(&items, "users", &schema, "_fts").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidOperator { .. }));
    }
}
