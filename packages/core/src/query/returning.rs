//! §4.3 Returning composer.

use crate::error::GatewayError;
use crate::schema::SchemaSnapshot;
use crate::validator::{bracket, validate_identifier};

pub fn build_returning(
    columns: &[String],
    table: &str,
    schema: &SchemaSnapshot,
) -> Result<String, GatewayError> {
    if columns.is_empty() {
        return Ok(String::new());
    }
    if columns.len() == 1 && columns[0] == "*" {
        return Ok("RETURNING *".to_string());
    }

    let mut quoted = Vec::with_capacity(columns.len());
    for column in columns {
        validate_identifier(column)?;
        schema.find_column(table, column)?;
        quoted.push(bracket(column));
    }
    Ok(format!("RETURNING {}", quoted.join(", ")))
}
