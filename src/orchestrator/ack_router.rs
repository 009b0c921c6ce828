//! Acknowledgment routing and stage cascades.
//!
//! Every ack is first recorded in the ledger. Cascades are only evaluated
//! once the meeting has ended, and each downstream predicate is a pure read
//! of the ledger, so re-evaluating it after a redelivery or a later ack is
//! safe. Cascade failures are logged and counted, never returned: the ack
//! itself is already durable.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cleanup::{CleanupCoordinator, CleanupReport};
use super::dispatcher::TaskDispatcher;
use crate::bus::{AckMode, DeliveryOutcome};
use crate::error::{bounded, OrchestratorError, Result};
use crate::ledger::TaskLedger;
use crate::pipeline::{
    AckMessage, AckStatus, MeetingStatus, StagePayload, StageSummary, StageType, TaskId,
    TaskStatus,
};
use crate::storage::VolumeSet;

/// What evaluating the cascades of one meeting produced.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CascadeOutcome {
    pub dispatched: Vec<(StageType, TaskId)>,
    pub cleanup: Option<CleanupReport>,
    pub failures: usize,
}

impl CascadeOutcome {
    pub fn dispatched_stages(&self) -> Vec<StageType> {
        self.dispatched.iter().map(|(stage, _)| *stage).collect()
    }

    fn record(&mut self, stage: StageType, result: Result<Option<TaskId>>, meeting_id: &str) {
        match result {
            Ok(Some(task_id)) => self.dispatched.push((stage, task_id)),
            Ok(None) => {}
            Err(e) => {
                error!(
                    "Failed to cascade to {} for meeting {}: {}",
                    stage, meeting_id, e
                );
                self.failures += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum AckDisposition {
    /// Recorded; the meeting has not ended (or its status was unreadable).
    Deferred,
    /// The meeting is unknown or already cleaned up; stray entries removed.
    Discarded,
    /// Recorded and cascades evaluated.
    Cascaded(CascadeOutcome),
}

pub struct AckRouter {
    ledger: Arc<dyn TaskLedger>,
    dispatcher: Arc<TaskDispatcher>,
    cleanup: Arc<CleanupCoordinator>,
    report_volume: PathBuf,
    verify_report_artifact: bool,
    timeout: Duration,
}

impl AckRouter {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        dispatcher: Arc<TaskDispatcher>,
        cleanup: Arc<CleanupCoordinator>,
        report_volume: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            dispatcher,
            cleanup,
            report_volume,
            verify_report_artifact: false,
            timeout,
        }
    }

    /// Require the rendered report to exist before dispatching notification.
    pub fn with_report_verification(mut self, verify: bool) -> Self {
        self.verify_report_artifact = verify;
        self
    }

    /// Decode, route and map the result onto a delivery outcome.
    ///
    /// With [`AckMode::Auto`] the delivery was acknowledged on receipt, so
    /// every failure is logged and dropped.
    pub async fn handle_delivery(&self, body: &[u8], mode: AckMode) -> DeliveryOutcome {
        let ack = match AckMessage::decode(body) {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Rejecting malformed ack: {}", e);
                return match mode {
                    AckMode::Auto => DeliveryOutcome::Ack,
                    AckMode::Manual => DeliveryOutcome::Reject,
                };
            }
        };

        match self.handle(&ack).await {
            Ok(_) => DeliveryOutcome::Ack,
            Err(e) => {
                error!("Failed to record ack for task {}: {}", ack.task_id, e);
                match mode {
                    AckMode::Auto => DeliveryOutcome::Ack,
                    AckMode::Manual if e.is_storage() => DeliveryOutcome::Requeue,
                    AckMode::Manual => DeliveryOutcome::Reject,
                }
            }
        }
    }

    /// Record one ack and, if the meeting has ended, run its cascade.
    ///
    /// Only a failure to record the ack is returned as an error.
    pub async fn handle(&self, ack: &AckMessage) -> Result<AckDisposition> {
        let meeting_id = ack.meeting_id.as_str();
        debug!(
            "Ack for task {} ({}): {}",
            ack.task_id,
            ack.task_type,
            ack.status.as_str()
        );

        bounded(
            self.timeout,
            "update task status",
            self.ledger
                .update_task_status(meeting_id, &ack.task_id, TaskStatus::from(ack.status)),
        )
        .await?;

        let status = match bounded(
            self.timeout,
            "get meeting status",
            self.ledger.meeting_status(meeting_id),
        )
        .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    "Could not read status of meeting {}, deferring cascade: {}",
                    meeting_id, e
                );
                return Ok(AckDisposition::Deferred);
            }
        };

        match status {
            None => {
                self.discard_stray_entries(meeting_id, &ack.task_id).await;
                Ok(AckDisposition::Discarded)
            }
            Some(MeetingStatus::Started) => {
                debug!("Meeting {} still live, cascade deferred", meeting_id);
                Ok(AckDisposition::Deferred)
            }
            Some(MeetingStatus::Ended) => Ok(AckDisposition::Cascaded(self.cascade(ack).await)),
        }
    }

    /// Re-evaluate every cascade an already recorded ack could have started.
    ///
    /// A stage takes part if it holds at least one terminal task, as if its
    /// latest ack had just arrived. An ended meeting without any task never
    /// gets an ack, so it is cleaned up here. Does nothing unless the meeting
    /// ended.
    pub async fn evaluate_cascades(&self, meeting_id: &str) -> Result<CascadeOutcome> {
        let mut outcome = CascadeOutcome::default();

        let status = bounded(
            self.timeout,
            "get meeting status",
            self.ledger.meeting_status(meeting_id),
        )
        .await?;
        if status != Some(MeetingStatus::Ended) {
            debug!("Meeting {} has not ended, nothing to rescan", meeting_id);
            return Ok(outcome);
        }

        let tasks = bounded(
            self.timeout,
            "list meeting tasks",
            self.ledger.task_statuses(meeting_id),
        )
        .await?;
        if tasks.is_empty() {
            info!("Meeting {} ended without media, cleaning up", meeting_id);
            outcome.cleanup = Some(self.cleanup.cleanup(meeting_id).await);
            return Ok(outcome);
        }

        let transcription = self.summary_of(meeting_id, StageType::Transcription).await?;
        if has_terminal(&transcription) {
            let result = self.cascade_summary(meeting_id).await;
            outcome.record(StageType::Summary, result, meeting_id);
        }

        let ocr = self.summary_of(meeting_id, StageType::Ocr).await?;
        let summary = self.summary_of(meeting_id, StageType::Summary).await?;
        if has_terminal(&ocr) || has_terminal(&summary) {
            let result = self.cascade_report(meeting_id).await;
            outcome.record(StageType::Report, result, meeting_id);
        }

        let report = self.summary_of(meeting_id, StageType::Report).await?;
        if report.completed > 0 {
            let result = self.cascade_notification(meeting_id).await;
            outcome.record(StageType::Notification, result, meeting_id);
        }

        let notification = self.summary_of(meeting_id, StageType::Notification).await?;
        if notification.completed > 0 {
            outcome.cleanup = Some(self.cleanup.cleanup(meeting_id).await);
        }

        if !outcome.dispatched.is_empty() {
            info!(
                "Rescan of meeting {} dispatched {:?}",
                meeting_id,
                outcome.dispatched_stages()
            );
        }
        Ok(outcome)
    }

    async fn cascade(&self, ack: &AckMessage) -> CascadeOutcome {
        let meeting_id = ack.meeting_id.as_str();
        let mut outcome = CascadeOutcome::default();

        match (ack.task_type, ack.status) {
            (StageType::Transcription, _) => {
                let result = self.cascade_summary(meeting_id).await;
                outcome.record(StageType::Summary, result, meeting_id);
            }
            (StageType::Ocr, _) | (StageType::Summary, _) => {
                let result = self.cascade_report(meeting_id).await;
                outcome.record(StageType::Report, result, meeting_id);
            }
            (StageType::Report, AckStatus::Completed) => {
                let result = self.cascade_notification(meeting_id).await;
                outcome.record(StageType::Notification, result, meeting_id);
            }
            (StageType::Notification, AckStatus::Completed) => {
                outcome.cleanup = Some(self.cleanup.cleanup(meeting_id).await);
            }
            (stage, AckStatus::Failed) => {
                warn!(
                    "{} task {} failed for meeting {}, pipeline stops here",
                    stage, ack.task_id, meeting_id
                );
            }
        }

        outcome
    }

    /// Transcription done → summary.
    async fn cascade_summary(&self, meeting_id: &str) -> Result<Option<TaskId>> {
        let transcription = self.summary_of(meeting_id, StageType::Transcription).await?;
        if !transcription.all_terminal() {
            debug!(
                "Meeting {}: {} transcription tasks still pending",
                meeting_id, transcription.pending
            );
            return Ok(None);
        }

        self.dispatch_once(meeting_id, StagePayload::Summary {}).await
    }

    /// Transcription, OCR and summary all done → report.
    async fn cascade_report(&self, meeting_id: &str) -> Result<Option<TaskId>> {
        for stage in [StageType::Transcription, StageType::Ocr, StageType::Summary] {
            let summary = self.summary_of(meeting_id, stage).await?;
            if !summary.all_terminal() {
                debug!(
                    "Meeting {}: {} {} tasks still pending, report waits",
                    meeting_id, summary.pending, stage
                );
                return Ok(None);
            }
        }

        self.dispatch_once(meeting_id, StagePayload::Report {}).await
    }

    /// Report rendered → notify the meeting owner.
    async fn cascade_notification(&self, meeting_id: &str) -> Result<Option<TaskId>> {
        let existing = self.summary_of(meeting_id, StageType::Notification).await?;
        if existing.blocks_redispatch() {
            debug!("Meeting {}: notification already dispatched", meeting_id);
            return Ok(None);
        }

        let email = bounded(
            self.timeout,
            "get notify address",
            self.ledger.notify_address(meeting_id),
        )
        .await?
        .ok_or_else(|| {
            OrchestratorError::not_found(format!("notify address for meeting {}", meeting_id))
        })?;

        let report_path = VolumeSet::report_artifact_path(&self.report_volume, meeting_id)?;
        if self.verify_report_artifact && !tokio::fs::try_exists(&report_path).await.unwrap_or(false) {
            return Err(OrchestratorError::not_found(format!(
                "report artifact {}",
                report_path.display()
            )));
        }

        let payload = StagePayload::Notification {
            file_path: report_path.to_string_lossy().into_owned(),
            email,
        };
        self.dispatcher.send(meeting_id, payload).await.map(Some)
    }

    /// Dispatch unless the stage already has a pending or completed task.
    async fn dispatch_once(&self, meeting_id: &str, payload: StagePayload) -> Result<Option<TaskId>> {
        let stage = payload.stage();
        let existing = self.summary_of(meeting_id, stage).await?;
        if existing.blocks_redispatch() {
            debug!(
                "Meeting {}: {} already dispatched ({} pending, {} completed)",
                meeting_id, stage, existing.pending, existing.completed
            );
            return Ok(None);
        }

        self.dispatcher.send(meeting_id, payload).await.map(Some)
    }

    async fn summary_of(&self, meeting_id: &str, stage: StageType) -> Result<StageSummary> {
        bounded(
            self.timeout,
            "scan stage tasks",
            self.ledger.stage_summary(meeting_id, stage),
        )
        .await
    }

    async fn discard_stray_entries(&self, meeting_id: &str, task_id: &TaskId) {
        warn!(
            "Ack for task {} refers to unknown meeting {}, discarding",
            task_id, meeting_id
        );
        if let Err(e) = bounded(
            self.timeout,
            "delete meeting entries",
            self.ledger.delete_all_meeting_entries(meeting_id),
        )
        .await
        {
            warn!("Failed to remove stray entries for meeting {}: {}", meeting_id, e);
        }
    }
}

fn has_terminal(summary: &StageSummary) -> bool {
    summary.completed + summary.failed > 0
}
