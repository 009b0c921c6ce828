//! Per-meeting task ledger.
//!
//! Holds, per meeting, the task id → status map and the scalar meeting
//! attributes (lifecycle status, notify address). All operations are remote
//! store calls; callers bound them with [`crate::error::bounded`].

pub mod keys;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::pipeline::{MeetingStatus, StageSummary, StageType, TaskId, TaskStatus};

pub use memory::InMemoryLedger;
pub use sqlite::SqliteLedger;

/// Default number of keys examined per scan page during meeting deletion.
pub const DEFAULT_SCAN_BATCH: usize = 100;

#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Register a task as pending. Re-adding an id overwrites it.
    async fn add_task(&self, meeting_id: &str, task_id: &TaskId) -> Result<()>;

    async fn update_task_status(
        &self,
        meeting_id: &str,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<()>;

    /// Every task recorded for the meeting, across all stages.
    async fn task_statuses(&self, meeting_id: &str) -> Result<BTreeMap<TaskId, TaskStatus>>;

    async fn set_meeting_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<()>;

    async fn meeting_status(&self, meeting_id: &str) -> Result<Option<MeetingStatus>>;

    async fn set_notify_address(&self, meeting_id: &str, address: &str) -> Result<()>;

    async fn notify_address(&self, meeting_id: &str) -> Result<Option<String>>;

    /// Keys currently stored under the meeting's namespace.
    async fn meeting_keys(&self, meeting_id: &str) -> Result<Vec<String>>;

    /// Remove every key of the meeting, paging through its namespace until
    /// the scan is exhausted. Keys of meetings whose id extends this one
    /// (`team:42` for `team`) are left alone. Returns the number of keys
    /// removed; absent keys are not an error.
    async fn delete_all_meeting_entries(&self, meeting_id: &str) -> Result<usize>;

    async fn stage_summary(&self, meeting_id: &str, stage: StageType) -> Result<StageSummary> {
        let tasks = self.task_statuses(meeting_id).await?;
        let mut summary = StageSummary::default();
        for (task_id, status) in &tasks {
            if task_id.stage_for(meeting_id) == Some(stage) {
                summary.record(*status);
            }
        }
        Ok(summary)
    }

    /// True when no task of `stage` is still pending, including when the
    /// meeting never produced a task of that stage.
    async fn all_tasks_of_type_terminal(&self, meeting_id: &str, stage: StageType) -> Result<bool> {
        Ok(self.stage_summary(meeting_id, stage).await?.all_terminal())
    }
}
