//! Create-table / alter-table composer, shared by the raw schema-management
//! endpoint (§6) and the template engine's sync procedure (§4.7).

use crate::schema::{Column, DefaultValue, Table};
use crate::validator::{bracket, escape_literal, validate_identifier};
use crate::error::GatewayError;

pub fn create_table_sql(table: &Table) -> Result<String, GatewayError> {
    validate_identifier(&table.name)?;

    let mut column_defs = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        validate_identifier(&column.name)?;
        let is_pk = table.primary_key.as_deref() == Some(column.name.as_str());
        column_defs.push(column_definition_sql(column, is_pk)?);
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        bracket(&table.name),
        column_defs.join(", ")
    ))
}

pub fn add_column_sql(table_name: &str, column: &Column) -> Result<String, GatewayError> {
    validate_identifier(table_name)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        bracket(table_name),
        column_definition_sql(column, false)?
    ))
}

pub fn drop_table_sql(table_name: &str) -> Result<String, GatewayError> {
    validate_identifier(table_name)?;
    Ok(format!("DROP TABLE {}", bracket(table_name)))
}

fn column_definition_sql(column: &Column, is_primary_key: bool) -> Result<String, GatewayError> {
    validate_identifier(&column.name)?;
    let mut def = format!("{} {}", bracket(&column.name), column.column_type.as_sql());

    if is_primary_key {
        def.push_str(" PRIMARY KEY");
    }
    if column.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default_sql(default));
    }
    if let Some(references) = &column.references {
        let (ref_table, ref_column) = references
            .split_once('.')
            .ok_or_else(|| GatewayError::internal(format!("invalid references clause: {references}")))?;
        validate_identifier(ref_table)?;
        validate_identifier(ref_column)?;
        def.push_str(&format!(
            " REFERENCES {}({})",
            bracket(ref_table),
            bracket(ref_column)
        ));
    }

    Ok(def)
}

fn default_sql(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Null => "NULL".to_string(),
        DefaultValue::Literal(lit) => format!("'{}'", escape_literal(lit)),
        DefaultValue::Expression(expr) => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn emits_primary_key_and_not_null() {
        let mut table = Table::new("users");
        table.primary_key = Some("id".to_string());
        table.columns.push(Column::new("id", ColumnType::Integer));
        let mut name = Column::new("name", ColumnType::Text);
        name.not_null = true;
        table.columns.push(name);

        let sql = create_table_sql(&table).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE [users] ([id] INTEGER PRIMARY KEY, [name] TEXT NOT NULL)"
        );
    }

    #[test]
    fn add_column_emits_alter() {
        let column = Column::new("email", ColumnType::Text);
        let sql = add_column_sql("users", &column).unwrap();
        assert_eq!(sql, "ALTER TABLE [users] ADD COLUMN [email] TEXT");
    }
}
