//! Daughter databases are remote LibSQL instances opened fresh per request
//! and released on every exit path (§4.8, §9: "open on demand ... the
//! primary connection alone is pooled").

use libsql::{Builder, Database};
use tracing::instrument;

use super::error::DbError;

pub struct DaughterConnection {
    db: Database,
}

impl DaughterConnection {
    /// Synthesizes the hostname from the daughter's name and the configured
    /// Turso organization, opens a connection, and pings it to validate the
    /// token before handing it back (§4.6 "Open daughter for request").
    #[instrument(skip(token))]
    pub async fn open(name: &str, token: &str, organization: &str) -> Result<Self, DbError> {
        let url = format!("https://{name}-{organization}.turso.io");
        let db = Builder::new_remote(url, token.to_string())
            .build()
            .await
            .map_err(|e| DbError::connection_failed(name, e))?;

        let conn = db.connect().map_err(|e| DbError::connection_failed(name, e))?;
        conn.execute("SELECT 1", ()).await.map_err(DbError::from)?;

        Ok(Self { db })
    }

    pub async fn connect(&self) -> Result<libsql::Connection, DbError> {
        self.db.connect().map_err(DbError::from)
    }
}
