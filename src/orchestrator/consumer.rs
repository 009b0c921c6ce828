//! Ack consumer loops.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::ack_router::AckRouter;
use crate::bus::{AckMode, AckReceiver, Delivery, DeliveryOutcome};

pub struct AckConsumer {
    router: Arc<AckRouter>,
    mode: AckMode,
}

impl AckConsumer {
    pub fn new(router: Arc<AckRouter>, mode: AckMode) -> Self {
        Self { router, mode }
    }

    /// Process one delivery to completion and settle it.
    pub async fn process(&self, mut delivery: Delivery) -> DeliveryOutcome {
        if self.mode == AckMode::Auto {
            delivery.settle(DeliveryOutcome::Ack);
        }

        let outcome = self.router.handle_delivery(&delivery.body, self.mode).await;
        delivery.settle(outcome);
        outcome
    }

    /// Start `instances` loops sharing one inbound channel.
    ///
    /// Each loop handles one delivery at a time. A delivery that panics is
    /// logged and its producer sees the channel dropped; the loop carries on.
    pub fn spawn(self: Arc<Self>, receiver: AckReceiver, instances: usize) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));

        (0..instances.max(1))
            .map(|instance| {
                let consumer = Arc::clone(&self);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    info!("Ack consumer {} started ({:?} ack)", instance, consumer.mode);
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(delivery) = next else {
                            break;
                        };

                        let worker = Arc::clone(&consumer);
                        match tokio::spawn(async move { worker.process(delivery).await }).await {
                            Ok(outcome) => debug!("Consumer {} settled ack: {:?}", instance, outcome),
                            Err(e) => error!("Consumer {} ack handler panicked: {}", instance, e),
                        }
                    }
                    warn!("Ack consumer {} stopped: channel closed", instance);
                })
            })
            .collect()
    }
}
