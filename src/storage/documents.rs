//! Stage-output documents on SQLite.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::ArtifactStore;
use crate::error::{OrchestratorError, Result};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            meeting_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_meeting ON documents(collection, meeting_id)",
        [],
    )?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteArtifactStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArtifactStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::Storage(format!("failed to create documents directory: {}", e))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| OrchestratorError::storage("documents connection lock poisoned"))?;
            op(&guard)
        })
        .await?
    }

    /// Store a stage output document. Workers sharing the database use this.
    pub async fn insert_document(&self, collection: &str, meeting_id: &str, body: &str) -> Result<i64> {
        let (collection, meeting_id, body) =
            (collection.to_string(), meeting_id.to_string(), body.to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO documents (collection, meeting_id, body) VALUES (?1, ?2, ?3)",
                params![collection, meeting_id, body],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn count_documents(&self, collection: &str, meeting_id: &str) -> Result<u64> {
        let (collection, meeting_id) = (collection.to_string(), meeting_id.to_string());
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND meeting_id = ?2",
                params![collection, meeting_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn delete_meeting_documents(&self, collection: &str, meeting_id: &str) -> Result<u64> {
        let (collection, meeting_id) = (collection.to_string(), meeting_id.to_string());
        self.run(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND meeting_id = ?2",
                params![collection, meeting_id],
            )?;
            Ok(deleted as u64)
        })
        .await
    }
}
