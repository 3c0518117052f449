//! Gateway Error Taxonomy
//!
//! A single error enum shared by every builder, cache, and engine in this
//! crate. Handlers match on the variant to pick an HTTP status; builders
//! never need to know about HTTP at all.

use thiserror::Error;

/// All failure kinds the query engine and tenant control plane can produce.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    #[error("column not found: {table}.{column}")]
    ColumnNotFound { table: String, column: String },

    #[error("database not found: {name}")]
    DatabaseNotFound { name: String },

    #[error("template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("no foreign key relationship between {from} and {to}")]
    NoRelationship { from: String, to: String },

    #[error("invalid operator: {operator}")]
    InvalidOperator { operator: String },

    #[error("invalid column type for {column}: expected {expected}")]
    InvalidColumnType { column: String, expected: String },

    #[error("missing where clause for mutation on {table}")]
    MissingWhereClause { table: String },

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("identifier '{name}' exceeds maximum length of {max}")]
    IdentifierTooLong { name: String, max: usize },

    #[error("identifier '{name}' contains invalid character '{ch}'")]
    InvalidCharacter { name: String, ch: char },

    #[error("not a DDL query: {0}")]
    NotDdlQuery(String),

    #[error("select depth {depth} exceeds maximum of {max}")]
    QueryTooDeep { depth: usize, max: usize },

    #[error("operation on reserved table: {table}")]
    ReservedTable { table: String },

    #[error("template '{name}' is still in use by one or more databases")]
    TemplateInUse { name: String },

    #[error("no FTS index for table: {table}")]
    NoFtsIndex { table: String },

    #[error("batch of {size} operations exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("remote provider error ({status}): {body}")]
    RemoteProviderError { status: u16, body: String },

    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violation: {0}")]
    ForeignKeyViolation(String),

    #[error("not null constraint violation: {0}")]
    NotNullViolation(String),

    #[error("database error: {0}")]
    Database(crate::db::DbError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn missing_where_clause(table: impl Into<String>) -> Self {
        Self::MissingWhereClause {
            table: table.into(),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Rewrite a raw driver error message into a stable, user-facing error,
    /// per the §7 substring-match table. Returns `None` when the message
    /// doesn't match any known driver complaint, so callers can fall back to
    /// a generic internal error without leaking driver internals.
    pub fn from_driver_message(message: &str) -> Option<Self> {
        if message.contains("UNIQUE constraint failed") {
            Some(Self::UniqueViolation(message.to_string()))
        } else if message.contains("FOREIGN KEY constraint failed") {
            Some(Self::ForeignKeyViolation(message.to_string()))
        } else if message.contains("NOT NULL constraint failed") {
            Some(Self::NotNullViolation(message.to_string()))
        } else if message.contains("no such table") {
            Some(Self::Internal("no such table".to_string()))
        } else if message.contains("no such column") {
            Some(Self::Internal("no such column".to_string()))
        } else {
            None
        }
    }

    /// §7 status mapping, centralized so `http/extract.rs` stays a one-liner.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TableNotFound { .. }
            | Self::ColumnNotFound { .. }
            | Self::DatabaseNotFound { .. }
            | Self::TemplateNotFound { .. }
            | Self::NoRelationship { .. } => 404,

            Self::TemplateInUse { .. } => 409,
            Self::ReservedTable { .. } => 403,

            Self::InvalidOperator { .. }
            | Self::InvalidColumnType { .. }
            | Self::MissingWhereClause { .. }
            | Self::EmptyIdentifier
            | Self::IdentifierTooLong { .. }
            | Self::InvalidCharacter { .. }
            | Self::NotDdlQuery(_)
            | Self::QueryTooDeep { .. }
            | Self::NoFtsIndex { .. }
            | Self::BatchTooLarge { .. } => 400,

            Self::UniqueViolation(_) | Self::ForeignKeyViolation(_) => 409,
            Self::NotNullViolation(_) => 400,

            Self::RemoteProviderError { status, .. } => *status,

            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => 500,
        }
    }

    /// The safe, no-detail-leak message used for any unclassified 500.
    pub fn public_message(&self) -> String {
        if self.status_code() == 500 {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Runs every driver error through the §7 substring-match table before
/// falling back to an opaque 500, rather than deriving this via `#[from]`.
impl From<crate::db::DbError> for GatewayError {
    fn from(err: crate::db::DbError) -> Self {
        Self::from_driver_message(&err.to_string()).unwrap_or(Self::Database(err))
    }
}
