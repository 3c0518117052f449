//! §4.7 Template Engine — named table-shape lists, diffed and applied
//! against daughters to converge their schema.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::db::{DbError, PrimaryConnection};
use crate::error::GatewayError;
use crate::query::ddl;
use crate::schema::{self, Table};

use super::registry::TenantRegistry;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TableListBlob {
    tables: Vec<Table>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Template {
    pub id: i64,
    pub name: String,
    pub tables: Vec<Table>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncResult {
    pub database: String,
    pub success: bool,
    pub error: Option<String>,
    pub changes: Vec<String>,
}

pub struct TemplateEngine {
    primary: Arc<PrimaryConnection>,
}

impl TemplateEngine {
    pub fn new(primary: Arc<PrimaryConnection>) -> Self {
        Self { primary }
    }

    #[instrument(skip(self, tables))]
    pub async fn create(&self, name: &str, tables: Vec<Table>) -> Result<Template, GatewayError> {
        let blob = serde_json::to_vec(&TableListBlob { tables: tables.clone() })?;
        let now = Utc::now().to_rfc3339();

        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO {} (name, tables_blob, created_at, updated_at) VALUES (?, ?, ?, ?)",
                crate::validator::bracket(super::registry::TEMPLATES_TABLE)
            ),
            libsql::params![name, blob, now.as_str(), now.as_str()],
        )
        .await
        .map_err(DbError::from)?;

        self.get(name).await
    }

    #[instrument(skip(self, tables))]
    pub async fn update(&self, name: &str, tables: Vec<Table>) -> Result<Template, GatewayError> {
        self.get(name).await?;
        let blob = serde_json::to_vec(&TableListBlob { tables })?;
        let now = Utc::now().to_rfc3339();

        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "UPDATE {} SET tables_blob = ?, updated_at = ? WHERE name = ?",
                crate::validator::bracket(super::registry::TEMPLATES_TABLE)
            ),
            libsql::params![blob, now.as_str(), name],
        )
        .await
        .map_err(DbError::from)?;

        self.get(name).await
    }

    pub async fn get(&self, name: &str) -> Result<Template, GatewayError> {
        let conn = self.primary.connect().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, tables_blob, created_at, updated_at FROM {} WHERE name = ?",
                crate::validator::bracket(super::registry::TEMPLATES_TABLE)
            ))
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt.query(libsql::params![name]).await.map_err(DbError::from)?;

        match rows.next().await.map_err(DbError::from)? {
            Some(row) => row_to_template(&row),
            None => Err(GatewayError::TemplateNotFound {
                name: name.to_string(),
            }),
        }
    }

    pub async fn list(&self) -> Result<Vec<Template>, GatewayError> {
        let conn = self.primary.connect().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, name, tables_blob, created_at, updated_at FROM {}",
                crate::validator::bracket(super::registry::TEMPLATES_TABLE)
            ))
            .await
            .map_err(DbError::from)?;
        let mut rows = stmt.query(()).await.map_err(DbError::from)?;

        let mut templates = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::from)? {
            templates.push(row_to_template(&row)?);
        }
        Ok(templates)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, registry: &TenantRegistry, name: &str) -> Result<(), GatewayError> {
        let template = self.get(name).await?;
        let users = registry.list_by_template(template.id).await?;
        if !users.is_empty() {
            return Err(GatewayError::TemplateInUse {
                name: name.to_string(),
            });
        }

        let conn = self.primary.connect().await?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE name = ?",
                crate::validator::bracket(super::registry::TEMPLATES_TABLE)
            ),
            libsql::params![name],
        )
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    pub async fn associate(
        &self,
        registry: &TenantRegistry,
        daughter_name: &str,
        template_name: &str,
    ) -> Result<(), GatewayError> {
        let template = self.get(template_name).await?;
        registry.set_template(daughter_name, Some(template.id)).await
    }

    pub async fn disassociate(&self, registry: &TenantRegistry, daughter_name: &str) -> Result<(), GatewayError> {
        registry.set_template(daughter_name, None).await
    }

    pub async fn inspect(
        &self,
        registry: &TenantRegistry,
        daughter_name: &str,
    ) -> Result<Option<Template>, GatewayError> {
        let record = registry
            .find(daughter_name)
            .await?
            .ok_or_else(|| GatewayError::DatabaseNotFound {
                name: daughter_name.to_string(),
            })?;
        match record.template_id {
            Some(id) => {
                let templates = self.list().await?;
                Ok(templates.into_iter().find(|t| t.id == id))
            }
            None => Ok(None),
        }
    }

    /// §4.7 "Sync template → daughter(s)".
    #[instrument(skip(self, registry))]
    pub async fn sync(
        &self,
        registry: &TenantRegistry,
        template_name: &str,
        drop_extra: bool,
    ) -> Result<Vec<SyncResult>, GatewayError> {
        let template = self.get(template_name).await?;
        let daughters = registry.list_by_template(template.id).await?;

        let mut results = Vec::with_capacity(daughters.len());
        for daughter in daughters {
            results.push(self.sync_one(registry, &daughter.name, &template, drop_extra).await);
        }
        Ok(results)
    }

    /// Same as `sync`, but against whatever template is currently
    /// associated with a single named daughter.
    pub async fn sync_single(
        &self,
        registry: &TenantRegistry,
        daughter_name: &str,
        drop_extra: bool,
    ) -> Result<SyncResult, GatewayError> {
        let template = self
            .inspect(registry, daughter_name)
            .await?
            .ok_or_else(|| GatewayError::internal(format!("{daughter_name} has no associated template")))?;
        Ok(self.sync_one(registry, daughter_name, &template, drop_extra).await)
    }

    async fn sync_one(
        &self,
        registry: &TenantRegistry,
        daughter_name: &str,
        template: &Template,
        drop_extra: bool,
    ) -> SyncResult {
        match self.sync_one_fallible(registry, daughter_name, template, drop_extra).await {
            Ok(changes) => SyncResult {
                database: daughter_name.to_string(),
                success: true,
                error: None,
                changes,
            },
            Err(e) => {
                warn!(daughter_name, error = %e, "template sync failed");
                SyncResult {
                    database: daughter_name.to_string(),
                    success: false,
                    error: Some(e.public_message()),
                    changes: Vec::new(),
                }
            }
        }
    }

    async fn sync_one_fallible(
        &self,
        registry: &TenantRegistry,
        daughter_name: &str,
        template: &Template,
        drop_extra: bool,
    ) -> Result<Vec<String>, GatewayError> {
        let (daughter, _cached_schema) = registry.open_daughter(daughter_name).await?;
        let conn = daughter.connect().await?;
        let current_schema = schema::discover_schema(&conn).await?;

        let current: HashMap<String, &Table> = current_schema
            .tables
            .iter()
            .filter(|(name, _)| !TenantRegistry::is_reserved_table(name, crate::INTERNAL_TABLE_PREFIX))
            .map(|(name, table)| (name.clone(), table))
            .collect();
        let target: HashMap<String, &Table> = template
            .tables
            .iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        let mut changes = Vec::new();

        if drop_extra {
            for name in current.keys() {
                if !target.contains_key(name) {
                    conn.execute(&ddl::drop_table_sql(name)?, ())
                        .await
                        .map_err(DbError::from)?;
                    changes.push(format!("dropped table: {name}"));
                }
            }
        }

        for (name, table) in &target {
            if !current.contains_key(name) {
                conn.execute(&ddl::create_table_sql(table)?, ())
                    .await
                    .map_err(DbError::from)?;
                changes.push(format!("created table: {name}"));
            }
        }

        for (name, target_table) in &target {
            let Some(current_table) = current.get(name) else {
                continue;
            };
            for column in &target_table.columns {
                if current_table.column(&column.name).is_none() {
                    conn.execute(&ddl::add_column_sql(name, column)?, ())
                        .await
                        .map_err(DbError::from)?;
                    changes.push(format!("added column: {name}.{}", column.name));
                }
            }
        }

        if !changes.is_empty() {
            let refreshed = schema::discover_schema(&conn).await?;
            registry.persist_schema(daughter_name, &refreshed).await?;
            info!(daughter_name, changes = changes.len(), "template sync applied changes");
        }

        Ok(changes)
    }
}

fn row_to_template(row: &libsql::Row) -> Result<Template, GatewayError> {
    let blob: Vec<u8> = row.get(2).map_err(DbError::from)?;
    let parsed: TableListBlob = serde_json::from_slice(&blob)?;
    Ok(Template {
        id: row.get(0).map_err(DbError::from)?,
        name: row.get(1).map_err(DbError::from)?,
        tables: parsed.tables,
        created_at: row.get(3).map_err(DbError::from)?,
        updated_at: row.get(4).map_err(DbError::from)?,
    })
}
