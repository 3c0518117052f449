//! §9 design note: "Use a tagged-variant for filter values ... avoid
//! polymorphic operator objects."

use libsql::Value as LibsqlValue;
use serde_json::Value as JsonValue;

/// A bound SQL parameter, closed over the four shapes the where-composer
/// ever needs to emit: a single scalar, an `IN (...)` list, SQL `NULL`
/// (handled without a placeholder at all), or an FTS match string.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Scalar(JsonValue),
    List(Vec<JsonValue>),
    FtsQuery(String),
}

impl FilterValue {
    /// Flattens this value into the ordered list of bound parameters it
    /// contributes (0 for a bare `IS NULL`, 1 for a scalar/fts match, N for
    /// an `IN`/`BETWEEN` list).
    pub fn into_params(self) -> Vec<JsonValue> {
        match self {
            FilterValue::Scalar(v) => vec![v],
            FilterValue::List(vs) => vs,
            FilterValue::FtsQuery(q) => vec![JsonValue::String(q)],
        }
    }
}

/// Converts a parsed JSON scalar into the driver's bound-parameter type.
pub fn json_to_libsql(value: &JsonValue) -> LibsqlValue {
    match value {
        JsonValue::Null => LibsqlValue::Null,
        JsonValue::Bool(b) => LibsqlValue::Integer(if *b { 1 } else { 0 }),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                LibsqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                LibsqlValue::Real(f)
            } else {
                LibsqlValue::Null
            }
        }
        JsonValue::String(s) => LibsqlValue::Text(s.clone()),
        other => LibsqlValue::Text(other.to_string()),
    }
}

pub fn json_values_to_params(values: &[JsonValue]) -> Vec<LibsqlValue> {
    values.iter().map(json_to_libsql).collect()
}
