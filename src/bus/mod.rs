//! Message bus seam.
//!
//! Outbound: one queue per stage, task messages published as JSON.
//! Inbound: acknowledgment deliveries, each settled with a
//! [`DeliveryOutcome`] once the consumer is done with it.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::pipeline::{StageType, TaskMessage};

pub use http::HttpBus;
pub use memory::InMemoryBus;

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()>;
}

/// Queue name per stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueNames {
    pub transcription: String,
    pub ocr: String,
    pub summary: String,
    pub report: String,
    pub notification: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            transcription: "transcription_queue".to_string(),
            ocr: "ocr_queue".to_string(),
            summary: "summary_queue".to_string(),
            report: "report_queue".to_string(),
            notification: "email_queue".to_string(),
        }
    }
}

impl QueueNames {
    pub fn for_stage(&self, stage: StageType) -> &str {
        match stage {
            StageType::Transcription => &self.transcription,
            StageType::Ocr => &self.ocr,
            StageType::Summary => &self.summary,
            StageType::Report => &self.report,
            StageType::Notification => &self.notification,
        }
    }
}

/// When an inbound ack is acknowledged to its producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// At-most-once: acknowledged on receipt, failures are dropped.
    Auto,
    /// At-least-once: acknowledged after processing; storage failures on the
    /// primary update ask the producer to redeliver.
    #[default]
    Manual,
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ack,
    /// Poison message: drop, never redeliver.
    Reject,
    /// Transient failure: redeliver later.
    Requeue,
}

/// One inbound message plus the channel its producer waits on.
pub struct Delivery {
    pub body: Vec<u8>,
    reply: Option<oneshot::Sender<DeliveryOutcome>>,
}

impl Delivery {
    pub fn new(body: Vec<u8>) -> (Self, oneshot::Receiver<DeliveryOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                body,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Report the outcome. Only the first call has an effect.
    pub fn settle(&mut self, outcome: DeliveryOutcome) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(outcome);
        }
    }

    pub fn is_settled(&self) -> bool {
        self.reply.is_none()
    }
}

pub type AckSender = mpsc::Sender<Delivery>;
pub type AckReceiver = mpsc::Receiver<Delivery>;

pub fn ack_channel(capacity: usize) -> (AckSender, AckReceiver) {
    mpsc::channel(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_default() {
        let queues = QueueNames::default();
        assert_eq!(queues.for_stage(StageType::Transcription), "transcription_queue");
        assert_eq!(queues.for_stage(StageType::Ocr), "ocr_queue");
        assert_eq!(queues.for_stage(StageType::Summary), "summary_queue");
        assert_eq!(queues.for_stage(StageType::Report), "report_queue");
        assert_eq!(queues.for_stage(StageType::Notification), "email_queue");
    }

    #[test]
    fn test_ack_mode_serialization() {
        assert_eq!(serde_json::to_string(&AckMode::Auto).unwrap(), "\"auto\"");
        let parsed: AckMode = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(parsed, AckMode::Manual);
        assert_eq!(AckMode::default(), AckMode::Manual);
    }

    #[tokio::test]
    async fn test_delivery_settles_once() {
        let (mut delivery, rx) = Delivery::new(b"{}".to_vec());
        assert!(!delivery.is_settled());

        delivery.settle(DeliveryOutcome::Requeue);
        delivery.settle(DeliveryOutcome::Ack);

        assert!(delivery.is_settled());
        assert_eq!(rx.await.unwrap(), DeliveryOutcome::Requeue);
    }
}
