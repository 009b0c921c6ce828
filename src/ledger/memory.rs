//! In-process ledger with a redis-shaped keyspace.
//!
//! Keys hold either a scalar or a field map, and deletion pages through the
//! keyspace in fixed-size batches the way a `SCAN` cursor would.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::Mutex;
use tracing::debug;

use super::{keys, TaskLedger, DEFAULT_SCAN_BATCH};
use crate::error::{OrchestratorError, Result};
use crate::pipeline::{MeetingStatus, TaskId, TaskStatus};

#[derive(Debug, Clone)]
enum Entry {
    Scalar(String),
    Hash(BTreeMap<String, String>),
}

pub struct InMemoryLedger {
    entries: Mutex<BTreeMap<String, Entry>>,
    scan_batch: usize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_scan_batch(DEFAULT_SCAN_BATCH)
    }

    pub fn with_scan_batch(scan_batch: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            scan_batch: scan_batch.max(1),
        }
    }

    /// Every key in the store, across all meetings.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    /// Store an arbitrary scalar. Lets callers seed keys the ledger itself
    /// never writes.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Entry::Scalar(value.to_string()));
    }

    async fn hset(&self, key: String, field: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        match entries
            .entry(key.clone())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()))
        {
            Entry::Hash(map) => {
                map.insert(field.to_string(), value.to_string());
                Ok(())
            }
            Entry::Scalar(_) => Err(OrchestratorError::Storage(format!(
                "key {} holds a scalar, not a task map",
                key
            ))),
        }
    }

    async fn set(&self, key: String, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key, Entry::Scalar(value.to_string()));
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entries.lock().await.get(key) {
            None => Ok(None),
            Some(Entry::Scalar(value)) => Ok(Some(value.clone())),
            Some(Entry::Hash(_)) => Err(OrchestratorError::Storage(format!(
                "key {} holds a map, not a scalar",
                key
            ))),
        }
    }

    /// One page of keys under `prefix`, strictly after `cursor`.
    async fn scan_prefix(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Vec<String> {
        let start = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        self.entries
            .lock()
            .await
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskLedger for InMemoryLedger {
    async fn add_task(&self, meeting_id: &str, task_id: &TaskId) -> Result<()> {
        self.hset(
            keys::tasks(meeting_id),
            task_id.as_str(),
            TaskStatus::Pending.as_str(),
        )
        .await
    }

    async fn update_task_status(
        &self,
        meeting_id: &str,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<()> {
        self.hset(keys::tasks(meeting_id), task_id.as_str(), status.as_str())
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
        let entries = self.entries.lock().await;
        let map = match entries.get(&key) {
            None => return Ok(BTreeMap::new()),
            Some(Entry::Hash(map)) => map,
            Some(Entry::Scalar(_)) => {
                return Err(OrchestratorError::Storage(format!(
                    "key {} holds a scalar, not a task map",
                    key
                )))
            }
        };

        map.iter()
            .map(|(task_id, raw)| {
                TaskStatus::parse(raw)
                    .map(|status| (TaskId::from(task_id.as_str()), status))
                    .ok_or_else(|| {
                        OrchestratorError::Storage(format!(
                            "task {} has unknown status '{}'",
                            task_id, raw
                        ))
                    })
            })
            .collect()
    }

    async fn set_meeting_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<()> {
        self.set(keys::status(meeting_id), status.as_str()).await;
        Ok(())
    }

    async fn meeting_status(&self, meeting_id: &str) -> Result<Option<MeetingStatus>> {
        match self.get(&keys::status(meeting_id)).await? {
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
        self.set(keys::notify_address(meeting_id), address).await;
        Ok(())
    }

    async fn notify_address(&self, meeting_id: &str) -> Result<Option<String>> {
        self.get(&keys::notify_address(meeting_id)).await
    }

    async fn meeting_keys(&self, meeting_id: &str) -> Result<Vec<String>> {
        let found = self
            .scan_prefix(&keys::meeting_prefix(meeting_id), None, usize::MAX)
            .await;
        Ok(found
            .into_iter()
            .filter(|key| keys::belongs_to(key, meeting_id))
            .collect())
    }

    async fn delete_all_meeting_entries(&self, meeting_id: &str) -> Result<usize> {
        let prefix = keys::meeting_prefix(meeting_id);
        let mut cursor: Option<String> = None;
        let mut deleted = 0;

        loop {
            let batch = self
                .scan_prefix(&prefix, cursor.as_deref(), self.scan_batch)
                .await;
            let Some(last) = batch.last().cloned() else {
                break;
            };

            let mut entries = self.entries.lock().await;
            for key in batch.iter().filter(|key| keys::belongs_to(key, meeting_id)) {
                if entries.remove(key).is_some() {
                    deleted += 1;
                }
            }
            cursor = Some(last);
        }

        debug!("Deleted {} ledger keys for meeting_id={}", deleted, meeting_id);
        Ok(deleted)
    }
}
