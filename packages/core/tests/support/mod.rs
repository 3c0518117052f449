//! Shared fixtures for the integration tests in this directory. Lives under
//! `tests/support/` (not `tests/support.rs`) so cargo doesn't register it as
//! its own test binary.

use std::sync::Arc;

use async_trait::async_trait;
use gateway_core::config::GatewayConfig;
use gateway_core::db::PrimaryConnection;
use gateway_core::error::GatewayError;
use gateway_core::schema::discover_schema;
use gateway_core::tenant::{RemoteDatabase, RemoteProvider};
use tempfile::TempDir;

/// Opens a throwaway primary database under a fresh temp directory. The
/// `TempDir` must be kept alive by the caller for the database's lifetime.
///
/// `GatewayConfig` is built from its public fields rather than the crate's
/// own `#[cfg(test)]` fixture constructor: that constructor is only visible
/// when `gateway-core` itself is compiled as the crate under test, not when
/// it's linked as a dependency of an integration test binary like this one.
pub async fn open_primary() -> (TempDir, Arc<PrimaryConnection>, GatewayConfig) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("primary.db");
    let config = GatewayConfig {
        primary_db_path: path.clone(),
        turso_organization: None,
        turso_api_key: None,
        max_batch_operations: 100,
        max_query_depth: 5,
        max_query_limit: 1000,
        default_limit: 100,
        max_body_bytes: 10 * 1024 * 1024,
        token_expiry_seconds: None,
        fts_suffix: gateway_core::FTS_TABLE_SUFFIX.to_string(),
        internal_table_prefix: gateway_core::INTERNAL_TABLE_PREFIX.to_string(),
        http_addr: "127.0.0.1:0".to_string(),
    };
    let primary = Arc::new(PrimaryConnection::open(&path).await.expect("open primary"));
    (dir, primary, config)
}

pub async fn schema_of(primary: &PrimaryConnection) -> gateway_core::schema::SchemaSnapshot {
    let conn = primary.connect().await.expect("connect");
    discover_schema(&conn).await.expect("discover schema")
}

/// A `RemoteProvider` that never leaves the process, for exercising the
/// tenant registry without a real Turso organization.
#[derive(Default)]
pub struct FakeProvider;

#[async_trait]
impl RemoteProvider for FakeProvider {
    async fn list_databases(&self) -> Result<Vec<RemoteDatabase>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_hostname(&self, name: &str) -> Result<String, GatewayError> {
        Ok(format!("{name}.fake.turso.io"))
    }

    async fn create_database(&self, _name: &str, _group: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_database(&self, _name: &str) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn mint_token(&self, _name: &str, _expiry_seconds: Option<u64>) -> Result<String, GatewayError> {
        Ok("fake-token".to_string())
    }
}
