//! Data model for §3: Column, Table, ForeignKey, SchemaSnapshot.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// Parses a SQLite declared type. Unknown declared types default to
    /// `TEXT`, matching SQLite's own type-affinity fallback.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else if upper.contains("BLOB") {
            Self::Blob
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Literal(String),
    Expression(String),
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub default: Option<DefaultValue>,
    /// `"otherTable.otherColumn"`, if this column is itself a foreign key end.
    pub references: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            default: None,
            references: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub primary_key: Option<String>,
    /// Discovery order, preserved so generated `INSERT`/projection column
    /// lists are stable across calls.
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn non_blob_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.column_type != ColumnType::Blob)
    }

    /// The column that identifies a row uniquely for `ON CONFLICT`/`GROUP BY`
    /// purposes: the declared primary key, or the SQLite rowid alias.
    pub fn row_identity_column(&self) -> &str {
        self.primary_key.as_deref().unwrap_or("rowid")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub references_table: String,
    pub from_column: String,
    pub to_column: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: HashMap<String, Table>,
    pub foreign_keys: HashMap<String, Vec<ForeignKey>>,
    pub fts_indexed_tables: HashSet<String>,
}

impl SchemaSnapshot {
    pub fn find_table(&self, name: &str) -> Result<&Table, GatewayError> {
        self.tables
            .get(name)
            .ok_or_else(|| GatewayError::table_not_found(name))
    }

    pub fn find_column(&self, table: &str, column: &str) -> Result<&Column, GatewayError> {
        self.find_table(table)?
            .column(column)
            .ok_or_else(|| GatewayError::column_not_found(table, column))
    }

    /// Resolves the foreign key on `table` that points at `references`,
    /// i.e. the relation used when joining `table` as a child of
    /// `references` in a nested select.
    pub fn find_foreign_key(&self, table: &str, references: &str) -> Result<&ForeignKey, GatewayError> {
        self.foreign_keys
            .get(table)
            .and_then(|fks| fks.iter().find(|fk| fk.references_table == references))
            .ok_or_else(|| GatewayError::NoRelationship {
                from: table.to_string(),
                to: references.to_string(),
            })
    }

    pub fn has_fts_index(&self, table: &str) -> bool {
        self.fts_indexed_tables.contains(table)
    }
}
