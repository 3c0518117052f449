//! §4.6 Tenant Registry — the primary-database-backed inventory of daughter
//! databases, bootstrapped into two reserved tables on first open.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::GatewayConfig;
use crate::db::{DaughterConnection, DbError, PrimaryConnection};
use crate::error::GatewayError;
use crate::schema::{self, SchemaSnapshot};

use super::provider::RemoteProvider;

pub const DATABASES_TABLE: &str = "__gateway_databases";
pub const TEMPLATES_TABLE: &str = "__gateway_templates";
pub const PRIMARY_DATABASE_ID: i64 = 1;

#[derive(Debug, Clone, serde::Serialize)]
pub struct DaughterRecord {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(skip_serializing)]
    pub schema_blob: Vec<u8>,
    pub template_id: Option<i64>,
}

pub struct TenantRegistry {
    primary: Arc<PrimaryConnection>,
    provider: Arc<dyn RemoteProvider>,
    config: Arc<GatewayConfig>,
}

impl TenantRegistry {
    pub async fn open(
        primary: Arc<PrimaryConnection>,
        provider: Arc<dyn RemoteProvider>,
        config: Arc<GatewayConfig>,
    ) -> Result<Self, GatewayError> {
        let conn = primary.connect().await?;
        bootstrap(&conn).await?;
        Ok(Self {
            primary,
            provider,
            config,
        })
    }

    /// Any table named with the internal prefix is reserved — not just
    /// `DATABASES_TABLE`/`TEMPLATES_TABLE` by exact name — so direct
    /// `/query` operations against it are rejected (§4.3 "Reserved table
    /// guard") and template sync (§4.7) never touches it.
    pub fn is_reserved_table(table: &str, prefix: &str) -> bool {
        table.starts_with(prefix)
    }

    #[instrument(skip(self))]
    pub async fn create_daughter(&self, name: &str, group: Option<&str>) -> Result<DaughterRecord, GatewayError> {
        self.provider
            .create_database(name, group.unwrap_or("default"))
            .await?;
        let token = self
            .provider
            .mint_token(name, self.config.token_expiry_seconds)
            .await?;

        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, token, schema_blob, template_id) VALUES (?, ?, ?, NULL)",
                crate::validator::bracket(DATABASES_TABLE)
            ),
            libsql::params![name, token.as_str(), Vec::<u8>::new()],
        )
        .await
        .map_err(DbError::from)?;

        info!(name, "daughter database created");
        self.find(name)
            .await?
            .ok_or_else(|| GatewayError::internal("daughter row vanished after insert"))
    }

    #[instrument(skip(self))]
    pub async fn register_daughter(&self, name: &str) -> Result<DaughterRecord, GatewayError> {
        let organization = self
            .config
            .turso_organization
            .clone()
            .ok_or(DbError::MissingOrganization)?;
        let _hostname = self.provider.get_hostname(name).await?;
        let token = self
            .provider
            .mint_token(name, self.config.token_expiry_seconds)
            .await?;

        let daughter = DaughterConnection::open(name, &token, &organization).await?;
        let conn = daughter.connect().await?;
        let snapshot = schema::discover_schema(&conn).await?;
        let blob = schema::blob::encode(&snapshot)?;

        let primary_conn = self.primary.connect().await?;
        primary_conn
            .execute(
                &format!(
                    "INSERT INTO {} (name, token, schema_blob, template_id) VALUES (?, ?, ?, NULL)",
                    crate::validator::bracket(DATABASES_TABLE)
                ),
                libsql::params![name, token.as_str(), blob],
            )
            .await
            .map_err(DbError::from)?;

        info!(name, "daughter database registered");
        self.find(name)
            .await?
            .ok_or_else(|| GatewayError::internal("daughter row vanished after insert"))
    }

    #[instrument(skip(self))]
    pub async fn register_all(&self) -> Result<Vec<DaughterRecord>, GatewayError> {
        let remote = self.provider.list_databases().await?;
        let existing = self.list_names().await?;

        let mut registered = Vec::new();
        for db in remote {
            if existing.contains(&db.name) {
                continue;
            }
            registered.push(self.register_daughter(&db.name).await?);
        }
        Ok(registered)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), GatewayError> {
        self.find(name)
            .await?
            .ok_or_else(|| GatewayError::DatabaseNotFound {
                name: name.to_string(),
            })?;

        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE name = ?",
                crate::validator::bracket(DATABASES_TABLE)
            ),
            libsql::params![name],
        )
        .await
        .map_err(DbError::from)?;

        self.provider.delete_database(name).await?;
        Ok(())
    }

    /// §4.6 "Open daughter for request": look up, require
    /// `TURSO_ORGANIZATION`, open, ping, return handle + cached schema.
    /// Caller is responsible for closing the handle.
    pub async fn open_daughter(
        &self,
        name: &str,
    ) -> Result<(DaughterConnection, SchemaSnapshot), GatewayError> {
        let record = self
            .find(name)
            .await?
            .ok_or_else(|| GatewayError::DatabaseNotFound {
                name: name.to_string(),
            })?;
        let organization = self
            .config
            .turso_organization
            .clone()
            .ok_or(DbError::MissingOrganization)?;

        let daughter = DaughterConnection::open(name, &record.token, &organization).await?;
        daughter
            .connect()
            .await?
            .execute("SELECT 1", ())
            .await
            .map_err(DbError::from)?;

        let snapshot = schema::blob::decode(&record.schema_blob)?;
        Ok((daughter, snapshot))
    }

    pub async fn find(&self, name: &str) -> Result<Option<DaughterRecord>, GatewayError> {
        let conn = self.primary.connect().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, token, schema_blob, template_id FROM {} WHERE name = ?",
                crate::validator::bracket(DATABASES_TABLE)
            ))
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt.query(libsql::params![name]).await.map_err(DbError::from)?;

        match rows.next().await.map_err(DbError::from)? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_names(&self) -> Result<Vec<String>, GatewayError> {
        let conn = self.primary.connect().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT name FROM {}",
                crate::validator::bracket(DATABASES_TABLE)
            ))
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt.query(()).await.map_err(DbError::from)?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::from)? {
            names.push(row.get::<String>(0).map_err(DbError::from)?);
        }
        Ok(names)
    }

    pub async fn list_by_template(&self, template_id: i64) -> Result<Vec<DaughterRecord>, GatewayError> {
        let conn = self.primary.connect().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, token, schema_blob, template_id FROM {} WHERE template_id = ?",
                crate::validator::bracket(DATABASES_TABLE)
            ))
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt
            .query(libsql::params![template_id])
            .await
            .map_err(DbError::from)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::from)? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    pub async fn set_template(&self, name: &str, template_id: Option<i64>) -> Result<(), GatewayError> {
        self.find(name)
            .await?
            .ok_or_else(|| GatewayError::DatabaseNotFound {
                name: name.to_string(),
            })?;
        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "UPDATE {} SET template_id = ? WHERE name = ?",
                crate::validator::bracket(DATABASES_TABLE)
            ),
            libsql::params![template_id, name],
        )
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    pub async fn persist_schema(&self, name: &str, snapshot: &SchemaSnapshot) -> Result<(), GatewayError> {
        let blob = schema::blob::encode(snapshot)?;
        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "UPDATE {} SET schema_blob = ? WHERE name = ?",
                crate::validator::bracket(DATABASES_TABLE)
            ),
            libsql::params![blob, name],
        )
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    pub fn primary_connection(&self) -> &Arc<PrimaryConnection> {
        &self.primary
    }
}

fn row_to_record(row: &libsql::Row) -> Result<DaughterRecord, GatewayError> {
    Ok(DaughterRecord {
        id: row.get(0).map_err(DbError::from)?,
        name: row.get(1).map_err(DbError::from)?,
        token: row.get(2).map_err(DbError::from)?,
        schema_blob: row.get(3).map_err(DbError::from)?,
        template_id: row.get(4).map_err(DbError::from)?,
    })
}

/// Ensures `TEMPLATES_TABLE` and `DATABASES_TABLE` exist and seeds the
/// latter with the id=1 row representing the primary itself.
async fn bootstrap(conn: &libsql::Connection) -> Result<(), GatewayError> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                tables_blob BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            crate::validator::bracket(TEMPLATES_TABLE)
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                token TEXT NOT NULL,
                schema_blob BLOB NOT NULL,
                template_id INTEGER REFERENCES {}(id)
            )",
            crate::validator::bracket(DATABASES_TABLE),
            crate::validator::bracket(TEMPLATES_TABLE)
        ),
        (),
    )
    .await
    .map_err(DbError::from)?;

    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (id, name, token, schema_blob, template_id) VALUES ({}, 'primary', '', ?, NULL)",
            crate::validator::bracket(DATABASES_TABLE),
            PRIMARY_DATABASE_ID
        ),
        libsql::params![Vec::<u8>::new()],
    )
    .await
    .map_err(DbError::from)?;

    Ok(())
}
