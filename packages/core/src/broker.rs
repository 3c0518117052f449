//! §4.8 Connection Broker — routes a request to either the shared primary
//! handle or a fresh, request-owned daughter handle.

use std::sync::Arc;

use crate::db::{DaughterConnection, PrimaryConnection};
use crate::error::GatewayError;
use crate::schema::{SchemaCache, SchemaSnapshot};
use crate::tenant::TenantRegistry;

/// What a request handler acquired and must route its statements through.
pub enum AcquiredConnection {
    Primary {
        conn: libsql::Connection,
        schema: Arc<SchemaSnapshot>,
    },
    Daughter {
        conn: DaughterConnection,
        schema: SchemaSnapshot,
    },
}

impl AcquiredConnection {
    /// A connection handle bound to this acquisition. Cheap to call more
    /// than once: primary handles are clones of the shared pooled handle,
    /// daughter handles are fresh connections off the same `Database`.
    pub async fn connection(&self) -> Result<libsql::Connection, GatewayError> {
        match self {
            Self::Primary { conn, .. } => Ok(conn.clone()),
            Self::Daughter { conn, .. } => Ok(conn.connect().await?),
        }
    }

    pub fn schema(&self) -> &SchemaSnapshot {
        match self {
            Self::Primary { schema, .. } => schema.as_ref(),
            Self::Daughter { schema, .. } => schema,
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary { .. })
    }
}

pub struct ConnectionBroker {
    primary: Arc<PrimaryConnection>,
    primary_schema: Arc<SchemaCache>,
    registry: Arc<TenantRegistry>,
}

impl ConnectionBroker {
    pub fn new(
        primary: Arc<PrimaryConnection>,
        primary_schema: Arc<SchemaCache>,
        registry: Arc<TenantRegistry>,
    ) -> Self {
        Self {
            primary,
            primary_schema,
            registry,
        }
    }

    /// Callers must not close the returned connection; it is the shared
    /// pooled handle for the process lifetime.
    pub async fn acquire_primary(&self) -> Result<AcquiredConnection, GatewayError> {
        let conn = self.primary.connect().await?;
        let schema = self.primary_schema.snapshot().await;
        Ok(AcquiredConnection::Primary { conn, schema })
    }

    /// Returns a private handle; the caller must release it on every exit
    /// path, including errors (dropping it is sufficient).
    pub async fn acquire_daughter(&self, name: &str) -> Result<AcquiredConnection, GatewayError> {
        let (conn, schema) = self.registry.open_daughter(name).await?;
        Ok(AcquiredConnection::Daughter { conn, schema })
    }

    /// Dispatches based on whether the request declared a tenant header
    /// (§4.8: "Any handler dispatch must route the appropriate acquire call
    /// based on whether the request declares a tenant header").
    pub async fn acquire(&self, tenant: Option<&str>) -> Result<AcquiredConnection, GatewayError> {
        match tenant {
            None | Some("primary") => self.acquire_primary().await,
            Some(name) => self.acquire_daughter(name).await,
        }
    }

    pub async fn refresh_primary_schema(&self) -> Result<(), GatewayError> {
        let conn = self.primary.connect().await?;
        let snapshot = crate::schema::discover_schema(&conn).await?;
        self.primary_schema.replace(snapshot).await;
        Ok(())
    }

    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    pub fn primary(&self) -> &Arc<PrimaryConnection> {
        &self.primary
    }
}
