//! Meeting lifecycle: the collaborator surface that starts meetings, feeds
//! the first pipeline stages and ends them.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::ack_router::{AckRouter, CascadeOutcome};
use super::dispatcher::TaskDispatcher;
use crate::error::{bounded, OrchestratorError, Result};
use crate::ledger::TaskLedger;
use crate::pipeline::{MeetingStatus, StagePayload, StageType, TaskId, TaskStatus};

const NOTIFY_ADDRESS_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Point-in-time view of a meeting's ledger entries.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingSnapshot {
    pub meeting_id: String,
    pub status: Option<MeetingStatus>,
    pub notify_address: Option<String>,
    pub tasks: BTreeMap<TaskId, TaskStatus>,
}

impl MeetingSnapshot {
    /// Tasks of one stage, in id order.
    pub fn tasks_of(&self, stage: StageType) -> Vec<(&TaskId, TaskStatus)> {
        self.tasks
            .iter()
            .filter(|(task_id, _)| task_id.stage_for(&self.meeting_id) == Some(stage))
            .map(|(task_id, status)| (task_id, *status))
            .collect()
    }
}

pub struct MeetingLifecycle {
    ledger: Arc<dyn TaskLedger>,
    dispatcher: Arc<TaskDispatcher>,
    router: Arc<AckRouter>,
    address_pattern: Regex,
    timeout: Duration,
}

impl MeetingLifecycle {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        dispatcher: Arc<TaskDispatcher>,
        router: Arc<AckRouter>,
        timeout: Duration,
    ) -> Result<Self> {
        let address_pattern = Regex::new(NOTIFY_ADDRESS_PATTERN)
            .map_err(|e| OrchestratorError::InvalidInput(e.to_string()))?;
        Ok(Self {
            ledger,
            dispatcher,
            router,
            address_pattern,
            timeout,
        })
    }

    /// Open a new meeting owned by `notify_address` and return its id.
    pub async fn start(&self, notify_address: &str) -> Result<String> {
        let notify_address = notify_address.trim();
        if !self.address_pattern.is_match(notify_address) {
            return Err(OrchestratorError::InvalidInput(format!(
                "'{}' is not a valid email address",
                notify_address
            )));
        }

        // Hyphen-free so the stage segment of task ids stays unambiguous.
        let meeting_id = Uuid::new_v4().simple().to_string();

        bounded(
            self.timeout,
            "set notify address",
            self.ledger.set_notify_address(&meeting_id, notify_address),
        )
        .await?;
        bounded(
            self.timeout,
            "set meeting status",
            self.ledger
                .set_meeting_status(&meeting_id, MeetingStatus::Started),
        )
        .await?;

        info!("Started meeting {} for {}", meeting_id, notify_address);
        Ok(meeting_id)
    }

    /// Dispatch a first-stage task for a file the client already stored.
    pub async fn register_media(
        &self,
        meeting_id: &str,
        stage: StageType,
        file_path: &str,
    ) -> Result<TaskId> {
        if file_path.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "file_path must not be empty".to_string(),
            ));
        }
        let payload = StagePayload::for_media(stage, file_path.to_string())?;

        match self.status_of(meeting_id).await? {
            None => Err(unknown_meeting(meeting_id)),
            Some(MeetingStatus::Ended) => Err(OrchestratorError::InvalidState(format!(
                "meeting {} has ended and accepts no more media",
                meeting_id
            ))),
            Some(MeetingStatus::Started) => self.dispatcher.send(meeting_id, payload).await,
        }
    }

    /// Mark the meeting ended, then evaluate every cascade once.
    ///
    /// Ending twice is allowed and only repeats the evaluation.
    pub async fn end(&self, meeting_id: &str) -> Result<CascadeOutcome> {
        match self.status_of(meeting_id).await? {
            None => return Err(unknown_meeting(meeting_id)),
            Some(MeetingStatus::Started) => {
                bounded(
                    self.timeout,
                    "set meeting status",
                    self.ledger.set_meeting_status(meeting_id, MeetingStatus::Ended),
                )
                .await?;
                info!("Ended meeting {}", meeting_id);
            }
            Some(MeetingStatus::Ended) => {
                info!("Meeting {} already ended, re-evaluating", meeting_id);
            }
        }

        self.router.evaluate_cascades(meeting_id).await
    }

    pub async fn snapshot(&self, meeting_id: &str) -> Result<MeetingSnapshot> {
        let status = self.status_of(meeting_id).await?;
        let notify_address = bounded(
            self.timeout,
            "get notify address",
            self.ledger.notify_address(meeting_id),
        )
        .await?;
        let tasks = bounded(
            self.timeout,
            "get tasks",
            self.ledger.task_statuses(meeting_id),
        )
        .await?;

        if status.is_none() && notify_address.is_none() && tasks.is_empty() {
            return Err(unknown_meeting(meeting_id));
        }

        Ok(MeetingSnapshot {
            meeting_id: meeting_id.to_string(),
            status,
            notify_address,
            tasks,
        })
    }

    async fn status_of(&self, meeting_id: &str) -> Result<Option<MeetingStatus>> {
        bounded(
            self.timeout,
            "get meeting status",
            self.ledger.meeting_status(meeting_id),
        )
        .await
    }
}

fn unknown_meeting(meeting_id: &str) -> OrchestratorError {
    OrchestratorError::not_found(format!("meeting {}", meeting_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{InMemoryBus, QueueNames};
    use crate::ledger::InMemoryLedger;
    use crate::orchestrator::CleanupCoordinator;
    use crate::storage::{SqliteArtifactStore, VolumeSet};

    fn lifecycle() -> (MeetingLifecycle, Arc<InMemoryLedger>, Arc<InMemoryBus>) {
        let timeout = Duration::from_secs(1);
        let ledger = Arc::new(InMemoryLedger::new());
        let bus = Arc::new(InMemoryBus::new());
        let dispatcher = Arc::new(TaskDispatcher::new(
            ledger.clone(),
            bus.clone(),
            QueueNames::default(),
            timeout,
        ));
        let cleanup = Arc::new(CleanupCoordinator::new(
            ledger.clone(),
            Arc::new(SqliteArtifactStore::open_in_memory().unwrap()),
            vec!["summaries".to_string()],
            VolumeSet::new(Vec::new()),
            timeout,
        ));
        let router = Arc::new(AckRouter::new(
            ledger.clone(),
            dispatcher.clone(),
            cleanup,
            "/shared-report".into(),
            timeout,
        ));
        let lifecycle = MeetingLifecycle::new(ledger.clone(), dispatcher, router, timeout).unwrap();
        (lifecycle, ledger, bus)
    }

    #[tokio::test]
    async fn test_start_records_status_and_address() {
        let (lifecycle, ledger, _) = lifecycle();
        let meeting_id = lifecycle.start("owner@example.com").await.unwrap();

        assert!(!meeting_id.contains('-'));
        assert_eq!(
            ledger.meeting_status(&meeting_id).await.unwrap(),
            Some(MeetingStatus::Started)
        );
        assert_eq!(
            ledger.notify_address(&meeting_id).await.unwrap().as_deref(),
            Some("owner@example.com")
        );
    }

    #[tokio::test]
    async fn test_start_rejects_bad_address() {
        let (lifecycle, ledger, _) = lifecycle();
        let err = lifecycle.start("not-an-address").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
        assert!(ledger.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_media_only_while_started() {
        let (lifecycle, _, bus) = lifecycle();
        let meeting_id = lifecycle.start("owner@example.com").await.unwrap();

        let task_id = lifecycle
            .register_media(&meeting_id, StageType::Ocr, "/shared-ocr/shot.png")
            .await
            .unwrap();
        assert_eq!(task_id.stage_for(&meeting_id), Some(StageType::Ocr));
        assert_eq!(bus.published("ocr_queue").await.len(), 1);

        assert!(matches!(
            lifecycle
                .register_media(&meeting_id, StageType::Summary, "/x")
                .await,
            Err(OrchestratorError::InvalidInput(_))
        ));

        lifecycle.end(&meeting_id).await.unwrap();
        assert!(matches!(
            lifecycle
                .register_media(&meeting_id, StageType::Transcription, "/a.wav")
                .await,
            Err(OrchestratorError::InvalidState(_))
        ));
        assert!(matches!(
            lifecycle
                .register_media("missing", StageType::Transcription, "/a.wav")
                .await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_end_unknown_meeting_is_not_found() {
        let (lifecycle, _, _) = lifecycle();
        assert!(matches!(
            lifecycle.end("nope").await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_end_without_media_cleans_up() {
        let (lifecycle, ledger, bus) = lifecycle();
        let meeting_id = lifecycle.start("owner@example.com").await.unwrap();

        let outcome = lifecycle.end(&meeting_id).await.unwrap();
        assert!(outcome.cleanup.unwrap().is_complete());
        assert!(outcome.dispatched.is_empty());
        assert!(ledger.keys().await.is_empty());
        assert_eq!(bus.total_published().await, 0);

        assert!(matches!(
            lifecycle.end(&meeting_id).await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_lists_tasks_by_stage() {
        let (lifecycle, _, _) = lifecycle();
        let meeting_id = lifecycle.start("owner@example.com").await.unwrap();
        lifecycle
            .register_media(&meeting_id, StageType::Transcription, "/a.wav")
            .await
            .unwrap();
        lifecycle
            .register_media(&meeting_id, StageType::Transcription, "/b.wav")
            .await
            .unwrap();

        let snapshot = lifecycle.snapshot(&meeting_id).await.unwrap();
        assert_eq!(snapshot.status, Some(MeetingStatus::Started));
        assert_eq!(snapshot.tasks_of(StageType::Transcription).len(), 2);
        assert!(snapshot.tasks_of(StageType::Ocr).is_empty());

        assert!(matches!(
            lifecycle.snapshot("missing").await,
            Err(OrchestratorError::NotFound(_))
        ));
    }
}
