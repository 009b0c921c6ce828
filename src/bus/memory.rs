//! In-process bus that keeps published tasks per queue.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::info;

use super::MessageBus;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::TaskMessage;

pub struct InMemoryBus {
    queues: Mutex<BTreeMap<String, Vec<TaskMessage>>>,
    available: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Take the bus offline (every publish fails) or bring it back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn published(&self, queue: &str) -> Vec<TaskMessage> {
        self.queues
            .lock()
            .await
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total_published(&self) -> usize {
        self.queues.lock().await.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Publish(format!(
                "queue {} is unreachable",
                queue
            )));
        }

        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push(message.clone());

        info!("Task {} sent to {}", message.task_id, queue);
        Ok(())
    }
}
