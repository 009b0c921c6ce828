//! Durable ledger on SQLite.
//!
//! One row per (key, field). Scalars use an empty field; task maps use the
//! task id as field. Raw SQL with rusqlite, calls moved off the runtime with
//! `spawn_blocking`.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::{keys, TaskLedger, DEFAULT_SCAN_BATCH};
use crate::error::{OrchestratorError, Result};
use crate::pipeline::{MeetingStatus, TaskId, TaskStatus};

const SCALAR_FIELD: &str = "";

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries (
            key TEXT NOT NULL,
            field TEXT NOT NULL DEFAULT '',
            value TEXT NOT NULL,
            updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (key, field)
        )",
        [],
    )?;
    Ok(())
}

#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    scan_batch: usize,
}

impl SqliteLedger {
    pub fn open(path: &Path, scan_batch: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::Storage(format!("failed to create ledger directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, scan_batch)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_SCAN_BATCH)
    }

    /// Give up on a locked database after `timeout` instead of the
    /// connection default, so a write abandoned by its caller's deadline
    /// does not commit much later.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        {
            let conn = self
                .conn
                .lock()
                .map_err(|_| OrchestratorError::storage("ledger connection lock poisoned"))?;
            conn.busy_timeout(timeout)?;
        }
        Ok(self)
    }

    fn from_connection(conn: Connection, scan_batch: usize) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            scan_batch: scan_batch.max(1),
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
                .map_err(|_| OrchestratorError::storage("ledger connection lock poisoned"))?;
            op(&guard)
        })
        .await?
    }

    async fn put(&self, key: String, field: String, value: String) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO ledger_entries (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value,
                 updated_at = CURRENT_TIMESTAMP",
                params![key, field, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_scalar(&self, key: String) -> Result<Option<String>> {
        self.run(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM ledger_entries WHERE key = ?1 AND field = ?2",
                    params![key, SCALAR_FIELD],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }
}

/// One page of keys under `prefix`, strictly after `cursor`.
fn scan_keys(conn: &Connection, prefix: &str, cursor: &str, limit: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT key FROM ledger_entries
         WHERE substr(key, 1, ?1) = ?2 AND key > ?3 ORDER BY key LIMIT ?4",
    )?;

    let prefix_len = prefix.chars().count() as i64;
    let keys = stmt
        .query_map(params![prefix_len, prefix, cursor, limit], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(keys)
}

#[async_trait]
impl TaskLedger for SqliteLedger {
    async fn add_task(&self, meeting_id: &str, task_id: &TaskId) -> Result<()> {
        self.put(
            keys::tasks(meeting_id),
            task_id.to_string(),
            TaskStatus::Pending.as_str().to_string(),
        )
        .await
    }

    async fn update_task_status(
        &self,
        meeting_id: &str,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        self.put(
            keys::tasks(meeting_id),
            task_id.to_string(),
            status.as_str().to_string(),
        )
        .await?;
        debug!(
            "Updated ledger for meeting_id={}, task_id={}, status={}",
            meeting_id,
            task_id,
            status.as_str()
        );
        Ok(())
    }

    async fn task_statuses(&self, meeting_id: &str) -> Result<BTreeMap<TaskId, TaskStatus>> {
        let key = keys::tasks(meeting_id);
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT field, value FROM ledger_entries WHERE key = ?1 AND field != ?2",
            )?;
            let rows = stmt
                .query_map(params![key, SCALAR_FIELD], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut tasks = BTreeMap::new();
            for (task_id, raw) in rows {
                let status = TaskStatus::parse(&raw).ok_or_else(|| {
                    OrchestratorError::Storage(format!(
                        "task {} has unknown status '{}'",
                        task_id, raw
                    ))
                })?;
                tasks.insert(TaskId::from(task_id), status);
            }
            Ok(tasks)
        })
        .await
    }

    async fn set_meeting_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<()> {
        self.put(
            keys::status(meeting_id),
            SCALAR_FIELD.to_string(),
            status.as_str().to_string(),
        )
        .await
    }

    async fn meeting_status(&self, meeting_id: &str) -> Result<Option<MeetingStatus>> {
        match self.get_scalar(keys::status(meeting_id)).await? {
            None => Ok(None),
            Some(raw) => MeetingStatus::parse(&raw).map(Some).ok_or_else(|| {
                OrchestratorError::Storage(format!(
                    "meeting {} has unknown status '{}'",
                    meeting_id, raw
                ))
            }),
        }
    }

    async fn set_notify_address(&self, meeting_id: &str, address: &str) -> Result<()> {
        self.put(
            keys::notify_address(meeting_id),
            SCALAR_FIELD.to_string(),
            address.to_string(),
        )
        .await
    }

    async fn notify_address(&self, meeting_id: &str) -> Result<Option<String>> {
        self.get_scalar(keys::notify_address(meeting_id)).await
    }

    async fn meeting_keys(&self, meeting_id: &str) -> Result<Vec<String>> {
        let prefix = keys::meeting_prefix(meeting_id);
        let id = meeting_id.to_string();
        self.run(move |conn| {
            let found = scan_keys(conn, &prefix, "", i64::MAX)?;
            Ok(found
                .into_iter()
                .filter(|key| keys::belongs_to(key, &id))
                .collect())
        })
        .await
    }

    async fn delete_all_meeting_entries(&self, meeting_id: &str) -> Result<usize> {
        let prefix = keys::meeting_prefix(meeting_id);
        let id = meeting_id.to_string();
        let batch = self.scan_batch as i64;

        let deleted = self
            .run(move |conn| {
                let mut cursor = String::new();
                let mut deleted = 0;
                loop {
                    let page = scan_keys(conn, &prefix, &cursor, batch)?;
                    let Some(last) = page.last().cloned() else {
                        break;
                    };
                    for key in page.iter().filter(|key| keys::belongs_to(key, &id)) {
                        conn.execute("DELETE FROM ledger_entries WHERE key = ?1", params![key])?;
                        deleted += 1;
                    }
                    cursor = last;
                }
                Ok(deleted)
            })
            .await?;

        debug!("Deleted {} ledger keys for meeting_id={}", deleted, meeting_id);
        Ok(deleted)
    }
}
