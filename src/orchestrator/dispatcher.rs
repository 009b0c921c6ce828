//! Task dispatch: ledger registration, then publication.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bus::{MessageBus, QueueNames};
use crate::error::{bounded, OrchestratorError, Result};
use crate::ledger::TaskLedger;
use crate::pipeline::{StagePayload, TaskId, TaskMessage, TaskStatus};

pub struct TaskDispatcher {
    ledger: Arc<dyn TaskLedger>,
    bus: Arc<dyn MessageBus>,
    queues: QueueNames,
    timeout: Duration,
    publish_timeout: Duration,
}

impl TaskDispatcher {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        bus: Arc<dyn MessageBus>,
        queues: QueueNames,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            bus,
            queues,
            timeout,
            publish_timeout: timeout,
        }
    }

    /// Bound publication separately from ledger calls.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Register a fresh pending task and publish it to its stage queue.
    ///
    /// The task is in the ledger before the message leaves the process. If
    /// registration or publication fails the task is rolled to `failed`
    /// (best effort) and the error is returned; nothing is retried here.
    pub async fn send(&self, meeting_id: &str, payload: StagePayload) -> Result<TaskId> {
        let stage = payload.stage();
        let task_id = TaskId::generate(meeting_id, stage);

        // A timed-out write may still commit once the ledger frees up.
        if let Err(e) = bounded(
            self.timeout,
            "add task",
            self.ledger.add_task(meeting_id, &task_id),
        )
        .await
        {
            warn!("Failed to register {} task {}: {}", stage, task_id, e);
            self.mark_failed(meeting_id, &task_id).await;
            return Err(e);
        }

        let message = TaskMessage {
            meeting_id: meeting_id.to_string(),
            task_id: task_id.clone(),
            payload,
        };
        let queue = self.queues.for_stage(stage);

        let published =
            match tokio::time::timeout(self.publish_timeout, self.bus.publish(queue, &message))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(OrchestratorError::Publish(format!(
                    "publish to {} timed out after {}ms",
                    queue,
                    self.publish_timeout.as_millis()
                ))),
            };

        if let Err(e) = published {
            warn!("Failed to publish {} task {}: {}", stage, task_id, e);
            self.mark_failed(meeting_id, &task_id).await;
            return Err(e);
        }

        debug!("Published {} to {}", task_id, queue);
        info!("Dispatched {} task {} for meeting {}", stage, task_id, meeting_id);
        Ok(task_id)
    }

    async fn mark_failed(&self, meeting_id: &str, task_id: &TaskId) {
        let rollback = bounded(
            self.timeout,
            "mark task failed",
            self.ledger
                .update_task_status(meeting_id, task_id, TaskStatus::Failed),
        )
        .await;
        if let Err(e) = rollback {
            warn!("Task {} may be left pending: {}", task_id, e);
        }
    }
}
