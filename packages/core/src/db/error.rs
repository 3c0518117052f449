//! Low-level connection errors, separate from the query-level taxonomy in
//! `crate::error` so the broker and connection wrappers don't need to know
//! about HTTP status codes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        #[source]
        source: libsql::Error,
    },

    #[error("failed to initialize schema: {0}")]
    InitializationFailed(String),

    #[error("invalid database path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("failed to create parent directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("libsql error: {0}")]
    Libsql(#[from] libsql::Error),

    #[error("failed to execute SQL: {context}")]
    SqlExecutionError { context: String },

    #[error("TURSO_ORGANIZATION is not set")]
    MissingOrganization,

    #[error("daughter database '{name}' has no stored token")]
    MissingToken { name: String },
}

impl DbError {
    pub fn connection_failed(path: impl Into<PathBuf>, source: libsql::Error) -> Self {
        Self::ConnectionFailed {
            path: path.into(),
            source,
        }
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn invalid_path(path: impl Into<PathBuf>) -> Self {
        Self::InvalidPath { path: path.into() }
    }

    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }
}
