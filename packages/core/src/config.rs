//! Environment-driven configuration, following the teacher's
//! `services/mcp_server_service.rs` pattern of
//! `std::env::var(...).ok()...unwrap_or(default)`.

use std::path::PathBuf;

/// Size and depth limits plus connection settings (§6 "Environment").
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub primary_db_path: PathBuf,
    pub turso_organization: Option<String>,
    pub turso_api_key: Option<String>,
    pub max_batch_operations: usize,
    pub max_query_depth: usize,
    pub max_query_limit: i64,
    pub default_limit: i64,
    pub max_body_bytes: usize,
    pub token_expiry_seconds: Option<u64>,
    pub fts_suffix: String,
    pub internal_table_prefix: String,
    pub http_addr: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            primary_db_path: std::env::var("GATEWAY_PRIMARY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/primary.db")),
            turso_organization: std::env::var("TURSO_ORGANIZATION").ok(),
            turso_api_key: std::env::var("TURSO_API_KEY").ok(),
            max_batch_operations: std::env::var("GATEWAY_MAX_BATCH_OPERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_query_depth: std::env::var("GATEWAY_MAX_QUERY_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            max_query_limit: std::env::var("GATEWAY_MAX_QUERY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            default_limit: std::env::var("GATEWAY_DEFAULT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_body_bytes: std::env::var("GATEWAY_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            token_expiry_seconds: std::env::var("GATEWAY_TOKEN_EXPIRY_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok()),
            fts_suffix: crate::FTS_TABLE_SUFFIX.to_string(),
            internal_table_prefix: crate::INTERNAL_TABLE_PREFIX.to_string(),
            http_addr: std::env::var("GATEWAY_HTTP_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }

    #[cfg(test)]
    pub fn test_fixture(primary_db_path: PathBuf) -> Self {
        Self {
            primary_db_path,
            turso_organization: None,
            turso_api_key: None,
            max_batch_operations: 100,
            max_query_depth: 5,
            max_query_limit: 1000,
            default_limit: 100,
            max_body_bytes: 10 * 1024 * 1024,
            token_expiry_seconds: None,
            fts_suffix: crate::FTS_TABLE_SUFFIX.to_string(),
            internal_table_prefix: crate::INTERNAL_TABLE_PREFIX.to_string(),
            http_addr: "127.0.0.1:0".to_string(),
        }
    }
}
