//! Removal of everything a finished meeting left behind.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::bounded;
use crate::ledger::TaskLedger;
use crate::storage::{ArtifactStore, VolumeSet};

/// What each cleanup step achieved. `None` marks a step that failed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupReport {
    pub ledger_keys: Option<usize>,
    pub documents: Option<u64>,
    pub directories: Option<usize>,
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CleanupCoordinator {
    ledger: Arc<dyn TaskLedger>,
    artifacts: Arc<dyn ArtifactStore>,
    collections: Vec<String>,
    volumes: VolumeSet,
    timeout: Duration,
}

impl CleanupCoordinator {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        artifacts: Arc<dyn ArtifactStore>,
        collections: Vec<String>,
        volumes: VolumeSet,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            artifacts,
            collections,
            volumes,
            timeout,
        }
    }

    /// Delete the meeting's ledger entries, documents and directories.
    ///
    /// The three steps are independent: a failing step is logged and
    /// recorded in the report, and the remaining steps still run. Running it
    /// again on an already cleaned meeting succeeds with zero counts.
    pub async fn cleanup(&self, meeting_id: &str) -> CleanupReport {
        let mut report = CleanupReport::default();

        match bounded(
            self.timeout,
            "delete meeting entries",
            self.ledger.delete_all_meeting_entries(meeting_id),
        )
        .await
        {
            Ok(count) => report.ledger_keys = Some(count),
            Err(e) => {
                warn!("Failed to delete ledger entries for meeting {}: {}", meeting_id, e);
                report.failures.push(format!("ledger: {}", e));
            }
        }

        let mut documents = 0u64;
        let mut documents_ok = true;
        for collection in &self.collections {
            match bounded(
                self.timeout,
                "delete documents",
                self.artifacts.delete_meeting_documents(collection, meeting_id),
            )
            .await
            {
                Ok(count) => documents += count,
                Err(e) => {
                    warn!(
                        "Failed to delete {} documents for meeting {}: {}",
                        collection, meeting_id, e
                    );
                    report.failures.push(format!("{}: {}", collection, e));
                    documents_ok = false;
                }
            }
        }
        if documents_ok {
            report.documents = Some(documents);
        }

        match self.volumes.remove_meeting_dirs(meeting_id).await {
            Ok(count) => report.directories = Some(count),
            Err(e) => {
                warn!("Failed to delete directories for meeting {}: {}", meeting_id, e);
                report.failures.push(format!("volumes: {}", e));
            }
        }

        if report.is_complete() {
            info!(
                "Cleaned up meeting {}: {} ledger keys, {} documents, {} directories",
                meeting_id,
                report.ledger_keys.unwrap_or_default(),
                report.documents.unwrap_or_default(),
                report.directories.unwrap_or_default()
            );
        } else {
            warn!(
                "Partial cleanup of meeting {} ({} step failures)",
                meeting_id,
                report.failures.len()
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OrchestratorError, Result};
    use crate::ledger::InMemoryLedger;
    use crate::pipeline::{MeetingStatus, TaskId};
    use crate::storage::{SqliteArtifactStore, STAGE_COLLECTIONS};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn delete_meeting_documents(&self, _collection: &str, _meeting_id: &str) -> Result<u64> {
            Err(OrchestratorError::storage("documents database unreachable"))
        }
    }

    fn collections() -> Vec<String> {
        STAGE_COLLECTIONS.iter().map(|c| c.to_string()).collect()
    }

    async fn seeded_ledger() -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger
            .add_task("M1", &TaskId::from("M1-summary-1"))
            .await
            .unwrap();
        ledger
            .set_meeting_status("M1", MeetingStatus::Ended)
            .await
            .unwrap();
        ledger
            .set_notify_address("M1", "owner@example.com")
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_cleanup_removes_all_three_kinds() {
        let ledger = seeded_ledger().await;
        let store = Arc::new(SqliteArtifactStore::open_in_memory().unwrap());
        store.insert_document("summaries", "M1", "{}").await.unwrap();
        store.insert_document("embeddings", "M1", "[]").await.unwrap();

        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("shared-report");
        std::fs::create_dir_all(reports.join("M1")).unwrap();

        let coordinator = CleanupCoordinator::new(
            ledger.clone(),
            store.clone(),
            collections(),
            VolumeSet::new(vec![reports.clone()]),
            Duration::from_secs(1),
        );

        let report = coordinator.cleanup("M1").await;
        assert!(report.is_complete());
        assert_eq!(report.ledger_keys, Some(3));
        assert_eq!(report.documents, Some(2));
        assert_eq!(report.directories, Some(1));

        assert!(ledger.meeting_keys("M1").await.unwrap().is_empty());
        assert!(!reports.join("M1").exists());

        // Running again finds nothing and does not fail.
        let again = coordinator.cleanup("M1").await;
        assert!(again.is_complete());
        assert_eq!(again.ledger_keys, Some(0));
    }

    #[tokio::test]
    async fn test_failing_step_does_not_stop_the_others() {
        let ledger = seeded_ledger().await;
        let root = tempfile::tempdir().unwrap();
        let audio = root.path().join("shared-transcription");
        std::fs::create_dir_all(audio.join("M1")).unwrap();

        let coordinator = CleanupCoordinator::new(
            ledger.clone(),
            Arc::new(BrokenStore),
            collections(),
            VolumeSet::new(vec![audio.clone()]),
            Duration::from_secs(1),
        );

        let report = coordinator.cleanup("M1").await;
        assert!(!report.is_complete());
        assert_eq!(report.documents, None);
        assert_eq!(report.failures.len(), STAGE_COLLECTIONS.len());
        assert_eq!(report.ledger_keys, Some(3));
        assert_eq!(report.directories, Some(1));
        assert!(!audio.join("M1").exists());
    }
}
