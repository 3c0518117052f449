//! The primary database is a local file, opened once at process start and
//! shared for the process lifetime (§4.8, §9 "per-request tenant
//! connections" contrasts this with daughters). Connection pattern mirrors
//! the teacher's `DatabaseService::new`/`connect_with_timeout`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use libsql::{Builder, Database};
use tracing::{info, instrument};

use super::error::DbError;

pub struct PrimaryConnection {
    db: Arc<Database>,
    path: PathBuf,
}

impl PrimaryConnection {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Builder::new_local(&path)
            .build()
            .await
            .map_err(|e| DbError::connection_failed(&path, e))?;

        let conn = db
            .connect()
            .map_err(|e| DbError::connection_failed(&path, e))?;
        initialize_pragmas(&conn).await?;

        info!(path = %path.display(), "primary database opened");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// A connection handle safe to hold across `.await` points from multiple
    /// tasks; matches the teacher's `connect_with_timeout` requirement.
    pub async fn connect(&self) -> Result<libsql::Connection, DbError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DbError::connection_failed(&self.path, e))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .map_err(DbError::from)?;
        Ok(conn)
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        let conn = self.connect().await?;
        conn.execute("SELECT 1", ()).await.map_err(DbError::from)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn initialize_pragmas(conn: &libsql::Connection) -> Result<(), DbError> {
    conn.execute("PRAGMA journal_mode=WAL", ())
        .await
        .map_err(DbError::from)?;
    conn.execute("PRAGMA busy_timeout=5000", ())
        .await
        .map_err(DbError::from)?;
    conn.execute("PRAGMA foreign_keys=ON", ())
        .await
        .map_err(DbError::from)?;
    Ok(())
}
